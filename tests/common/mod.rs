//! Shared test fixtures: synthesized MFP-3D `.ibw` files.

use bric_afm::mfp3d::ibw::{BIN_HEADER_SIZE, DATA_OFFSET};

pub const CHECKSUM_SPAN: usize = 384;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Builder for a synthetic version-5 Igor binary wave as the MFP-3D writes
/// them: one 3-D FP32 wave with channel names in dimension 2's labels.
pub struct IbwFixture {
    pub rows: usize,
    pub cols: usize,
    pub labels: Vec<&'static str>,
    pub x_start: f64,
    pub x_step: f64,
    pub y_start: f64,
    pub y_step: f64,
    pub endian: Endian,
    pub with_labels: bool,
}

impl Default for IbwFixture {
    fn default() -> Self {
        Self {
            rows: 8,
            cols: 8,
            labels: vec!["HeightTrace", "UserIn1Trace"],
            x_start: 0.0,
            x_step: 2.0e-7,
            y_start: 0.0,
            y_step: 2.0e-7,
            endian: Endian::Little,
            with_labels: true,
        }
    }
}

impl IbwFixture {
    /// Serialize the wave; `value(c, i, j)` supplies channel `c`'s sample
    /// at row `i`, column `j`.
    pub fn build(&self, value: impl Fn(usize, usize, usize) -> f64) -> Vec<u8> {
        let channels = self.labels.len();
        let npnts = self.rows * self.cols * channels;
        let note = b"synthetic scan";
        let labels_len = if self.with_labels {
            (channels + 1) * 32
        } else {
            0
        };

        let mut bytes = vec![0u8; DATA_OFFSET + npnts * 4 + note.len() + labels_len];

        // BinHeader5.
        self.put_i16(&mut bytes, 0, 5); // version
        self.put_i32(&mut bytes, 4, (320 + npnts * 4 - 4) as i32); // wfmSize
        self.put_i32(&mut bytes, 12, note.len() as i32); // noteSize
        self.put_i32(&mut bytes, 36 + 4 * 2, labels_len as i32); // dimLabelsSize[2]

        // WaveHeader5.
        const H: usize = BIN_HEADER_SIZE;
        self.put_i32(&mut bytes, H + 12, npnts as i32);
        self.put_i16(&mut bytes, H + 16, 2); // NT_FP32
        bytes[H + 28..H + 28 + 9].copy_from_slice(b"synthetic"); // bname
        let n_dim = [self.rows as i32, self.cols as i32, channels as i32, 0];
        let sf_a = [self.x_step, self.y_step, 1.0, 1.0];
        let sf_b = [self.x_start, self.y_start, 0.0, 0.0];
        for d in 0..4 {
            self.put_i32(&mut bytes, H + 68 + 4 * d, n_dim[d]);
            self.put_f64(&mut bytes, H + 84 + 8 * d, sf_a[d]);
            self.put_f64(&mut bytes, H + 116 + 8 * d, sf_b[d]);
        }
        bytes[H + 148] = b'm'; // dataUnits
        bytes[H + 152] = b'm'; // dimUnits[0]
        bytes[H + 156] = b'm'; // dimUnits[1]

        // Data block, Igor column-major: dimension 0 varies fastest.
        for c in 0..channels {
            for j in 0..self.cols {
                for i in 0..self.rows {
                    let flat = i + self.rows * (j + self.cols * c);
                    self.put_f32(
                        &mut bytes,
                        DATA_OFFSET + flat * 4,
                        value(c, i, j) as f32,
                    );
                }
            }
        }

        // Trailing blocks: note, then dimension 2's labels.
        let mut offset = DATA_OFFSET + npnts * 4;
        bytes[offset..offset + note.len()].copy_from_slice(note);
        offset += note.len();
        if self.with_labels {
            let mut entries: Vec<&str> = vec!["Channels"];
            entries.extend(&self.labels);
            for entry in entries {
                let n = entry.len().min(31);
                bytes[offset..offset + n].copy_from_slice(&entry.as_bytes()[..n]);
                offset += 32;
            }
        }

        fix_checksum(&mut bytes, self.endian);
        bytes
    }

    fn put_i16(&self, bytes: &mut [u8], offset: usize, v: i16) {
        let b = match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        };
        bytes[offset..offset + 2].copy_from_slice(&b);
    }

    fn put_i32(&self, bytes: &mut [u8], offset: usize, v: i32) {
        let b = match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        };
        bytes[offset..offset + 4].copy_from_slice(&b);
    }

    fn put_f32(&self, bytes: &mut [u8], offset: usize, v: f32) {
        let b = match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        };
        bytes[offset..offset + 4].copy_from_slice(&b);
    }

    fn put_f64(&self, bytes: &mut [u8], offset: usize, v: f64) {
        let b = match self.endian {
            Endian::Little => v.to_le_bytes(),
            Endian::Big => v.to_be_bytes(),
        };
        bytes[offset..offset + 8].copy_from_slice(&b);
    }
}

/// Rewrite the header checksum so the first 384 bytes sum to zero.
pub fn fix_checksum(bytes: &mut [u8], endian: Endian) {
    bytes[2] = 0;
    bytes[3] = 0;
    let mut sum: i16 = 0;
    for pair in bytes[..CHECKSUM_SPAN].chunks_exact(2) {
        let arr = [pair[0], pair[1]];
        let word = match endian {
            Endian::Little => i16::from_le_bytes(arr),
            Endian::Big => i16::from_be_bytes(arr),
        };
        sum = sum.wrapping_add(word);
    }
    let balance = (0i16).wrapping_sub(sum);
    let b = match endian {
        Endian::Little => balance.to_le_bytes(),
        Endian::Big => balance.to_be_bytes(),
    };
    bytes[2] = b[0];
    bytes[3] = b[1];
}
