//! Igor Binary Wave (version 5) container parsing.
//!
//! Layout per WaveMetrics Technical Note 003: a 64-byte `BinHeader5`, a
//! 320-byte `WaveHeader5` whose trailing 4-byte `wData` placeholder overlaps
//! the numeric data block (data begins at file offset 380), then optional
//! trailing blocks in fixed order: formula, note, extended data units,
//! extended dimension units, and per-dimension label blocks.
//!
//! Byte order is whatever machine wrote the file; it is detected from the
//! version field. The header checksum is the wrapping sum of the first 384
//! bytes read as signed 16-bit words, written so the total is zero.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IbwError {
    #[error("file truncated reading {what}: needed {needed} bytes, had {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("unsupported igor binary wave version: {0}")]
    UnsupportedVersion(i16),

    #[error("header checksum mismatch")]
    ChecksumMismatch,

    #[error("unsupported wave type {0:#06x}")]
    UnsupportedType(i16),

    #[error("wave dimensions {0:?} do not describe a multi-channel image")]
    NotAnImage([i32; 4]),

    #[error("channel labels missing from the layer dimension")]
    MissingLabels,

    #[error("invalid image structure: {0}")]
    Image(#[from] crate::image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size of `BinHeader5`.
pub const BIN_HEADER_SIZE: usize = 64;

/// Size of `WaveHeader5`, including the 4-byte `wData` placeholder.
pub const WAVE_HEADER_SIZE: usize = 320;

/// File offset of the numeric data block.
pub const DATA_OFFSET: usize = BIN_HEADER_SIZE + WAVE_HEADER_SIZE - 4;

/// The checksum covers both headers (the `wData` overlap included).
const CHECKSUM_SPAN: usize = BIN_HEADER_SIZE + WAVE_HEADER_SIZE;

/// Igor numeric type codes.
const NT_CMPLX: i16 = 0x01;
const NT_FP32: i16 = 0x02;
const NT_FP64: i16 = 0x04;
const NT_I8: i16 = 0x08;
const NT_I16: i16 = 0x10;
const NT_I32: i16 = 0x20;
const NT_UNSIGNED: i16 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Fixed-size reads at absolute offsets in one detected byte order.
struct Raw<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
}

impl<'a> Raw<'a> {
    fn slice(&self, offset: usize, len: usize, what: &'static str) -> Result<&'a [u8], IbwError> {
        let end = offset.checked_add(len).ok_or(IbwError::Truncated {
            what,
            needed: usize::MAX,
            available: self.bytes.len(),
        })?;
        if end > self.bytes.len() {
            return Err(IbwError::Truncated {
                what,
                needed: end,
                available: self.bytes.len(),
            });
        }
        Ok(&self.bytes[offset..end])
    }

    fn i16_at(&self, offset: usize, what: &'static str) -> Result<i16, IbwError> {
        let b = self.slice(offset, 2, what)?;
        let arr = [b[0], b[1]];
        Ok(match self.order {
            ByteOrder::Little => i16::from_le_bytes(arr),
            ByteOrder::Big => i16::from_be_bytes(arr),
        })
    }

    fn i32_at(&self, offset: usize, what: &'static str) -> Result<i32, IbwError> {
        let b = self.slice(offset, 4, what)?;
        let arr = [b[0], b[1], b[2], b[3]];
        Ok(match self.order {
            ByteOrder::Little => i32::from_le_bytes(arr),
            ByteOrder::Big => i32::from_be_bytes(arr),
        })
    }

    fn f64_at(&self, offset: usize, what: &'static str) -> Result<f64, IbwError> {
        let b = self.slice(offset, 8, what)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(match self.order {
            ByteOrder::Little => f64::from_le_bytes(arr),
            ByteOrder::Big => f64::from_be_bytes(arr),
        })
    }
}

/// NUL-padded fixed-width ASCII field to a String.
fn padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// The parts of `BinHeader5` the loader consumes.
#[derive(Debug, Clone)]
pub struct BinHeader5 {
    pub version: i16,
    pub wfm_size: i32,
    pub formula_size: i32,
    pub note_size: i32,
    pub data_e_units_size: i32,
    pub dim_e_units_size: [i32; 4],
    pub dim_labels_size: [i32; 4],
}

/// The parts of `WaveHeader5` the loader consumes.
#[derive(Debug, Clone)]
pub struct WaveHeader5 {
    pub npnts: i32,
    pub wave_type: i16,
    pub name: String,
    pub n_dim: [i32; 4],
    pub sf_a: [f64; 4],
    pub sf_b: [f64; 4],
    pub data_units: String,
    pub dim_units: [String; 4],
}

/// A parsed version-5 wave.
#[derive(Debug, Clone)]
pub struct Wave {
    pub bin_header: BinHeader5,
    pub header: WaveHeader5,

    /// Flat samples in Igor's column-major order: element `(i, j, c)` of a
    /// 3-D wave lives at `i + n_dim[0] * (j + n_dim[1] * c)`.
    pub data: Vec<f64>,

    /// Per-dimension label entries. Entry 0 names the dimension itself,
    /// entries `1..` name individual indices along it.
    pub dim_labels: [Vec<String>; 4],
}

/// Detect the byte order from the version field, rejecting non-v5 files.
fn detect_order(bytes: &[u8]) -> Result<ByteOrder, IbwError> {
    if bytes.len() < 2 {
        return Err(IbwError::Truncated {
            what: "version field",
            needed: 2,
            available: bytes.len(),
        });
    }
    let le = i16::from_le_bytes([bytes[0], bytes[1]]);
    let be = i16::from_be_bytes([bytes[0], bytes[1]]);
    if le == 5 {
        Ok(ByteOrder::Little)
    } else if be == 5 {
        Ok(ByteOrder::Big)
    } else {
        Err(IbwError::UnsupportedVersion(le))
    }
}

/// Verify the header checksum: signed 16-bit words of the first 384 bytes
/// sum (wrapping) to zero.
fn verify_checksum(bytes: &[u8], order: ByteOrder) -> Result<(), IbwError> {
    if bytes.len() < CHECKSUM_SPAN {
        return Err(IbwError::Truncated {
            what: "header checksum span",
            needed: CHECKSUM_SPAN,
            available: bytes.len(),
        });
    }
    let mut sum: i16 = 0;
    for pair in bytes[..CHECKSUM_SPAN].chunks_exact(2) {
        let arr = [pair[0], pair[1]];
        let word = match order {
            ByteOrder::Little => i16::from_le_bytes(arr),
            ByteOrder::Big => i16::from_be_bytes(arr),
        };
        sum = sum.wrapping_add(word);
    }
    if sum != 0 {
        return Err(IbwError::ChecksumMismatch);
    }
    Ok(())
}

fn parse_bin_header(raw: &Raw<'_>) -> Result<BinHeader5, IbwError> {
    let mut dim_e_units_size = [0i32; 4];
    let mut dim_labels_size = [0i32; 4];
    for d in 0..4 {
        dim_e_units_size[d] = raw.i32_at(20 + 4 * d, "bin header")?;
        dim_labels_size[d] = raw.i32_at(36 + 4 * d, "bin header")?;
    }
    Ok(BinHeader5 {
        version: raw.i16_at(0, "bin header")?,
        wfm_size: raw.i32_at(4, "bin header")?,
        formula_size: raw.i32_at(8, "bin header")?,
        note_size: raw.i32_at(12, "bin header")?,
        data_e_units_size: raw.i32_at(16, "bin header")?,
        dim_e_units_size,
        dim_labels_size,
    })
}

fn parse_wave_header(raw: &Raw<'_>) -> Result<WaveHeader5, IbwError> {
    const H: usize = BIN_HEADER_SIZE;

    let mut n_dim = [0i32; 4];
    let mut sf_a = [0f64; 4];
    let mut sf_b = [0f64; 4];
    for d in 0..4 {
        n_dim[d] = raw.i32_at(H + 68 + 4 * d, "wave header")?;
        sf_a[d] = raw.f64_at(H + 84 + 8 * d, "wave header")?;
        sf_b[d] = raw.f64_at(H + 116 + 8 * d, "wave header")?;
    }

    let mut dim_units: [String; 4] = Default::default();
    for d in 0..4 {
        dim_units[d] = padded_str(raw.slice(H + 152 + 4 * d, 4, "wave header")?);
    }

    Ok(WaveHeader5 {
        npnts: raw.i32_at(H + 12, "wave header")?,
        wave_type: raw.i16_at(H + 16, "wave header")?,
        name: padded_str(raw.slice(H + 28, 32, "wave header")?),
        n_dim,
        sf_a,
        sf_b,
        data_units: padded_str(raw.slice(H + 148, 4, "wave header")?),
        dim_units,
    })
}

/// Bytes per sample for a wave type, or an error for complex and unknown
/// types.
fn element_size(wave_type: i16) -> Result<usize, IbwError> {
    if wave_type & NT_CMPLX != 0 {
        return Err(IbwError::UnsupportedType(wave_type));
    }
    match wave_type & !NT_UNSIGNED {
        NT_FP32 => Ok(4),
        NT_FP64 => Ok(8),
        NT_I8 => Ok(1),
        NT_I16 => Ok(2),
        NT_I32 => Ok(4),
        _ => Err(IbwError::UnsupportedType(wave_type)),
    }
}

/// Decode the raw data block into f64 samples.
fn decode_data(block: &[u8], wave_type: i16, order: ByteOrder) -> Result<Vec<f64>, IbwError> {
    let unsigned = wave_type & NT_UNSIGNED != 0;
    let le = order == ByteOrder::Little;

    let out = match wave_type & !NT_UNSIGNED {
        NT_FP32 => block
            .chunks_exact(4)
            .map(|b| {
                let arr = [b[0], b[1], b[2], b[3]];
                let v = if le {
                    f32::from_le_bytes(arr)
                } else {
                    f32::from_be_bytes(arr)
                };
                v as f64
            })
            .collect(),
        NT_FP64 => block
            .chunks_exact(8)
            .map(|b| {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(b);
                if le {
                    f64::from_le_bytes(arr)
                } else {
                    f64::from_be_bytes(arr)
                }
            })
            .collect(),
        NT_I8 => block
            .iter()
            .map(|&b| {
                if unsigned {
                    b as f64
                } else {
                    b as i8 as f64
                }
            })
            .collect(),
        NT_I16 => block
            .chunks_exact(2)
            .map(|b| {
                let arr = [b[0], b[1]];
                if unsigned {
                    let v = if le {
                        u16::from_le_bytes(arr)
                    } else {
                        u16::from_be_bytes(arr)
                    };
                    v as f64
                } else {
                    let v = if le {
                        i16::from_le_bytes(arr)
                    } else {
                        i16::from_be_bytes(arr)
                    };
                    v as f64
                }
            })
            .collect(),
        NT_I32 => block
            .chunks_exact(4)
            .map(|b| {
                let arr = [b[0], b[1], b[2], b[3]];
                if unsigned {
                    let v = if le {
                        u32::from_le_bytes(arr)
                    } else {
                        u32::from_be_bytes(arr)
                    };
                    v as f64
                } else {
                    let v = if le {
                        i32::from_le_bytes(arr)
                    } else {
                        i32::from_be_bytes(arr)
                    };
                    v as f64
                }
            })
            .collect(),
        _ => return Err(IbwError::UnsupportedType(wave_type)),
    };
    Ok(out)
}

/// Parse an IBW v5 file.
pub fn parse(bytes: &[u8]) -> Result<Wave, IbwError> {
    let order = detect_order(bytes)?;
    verify_checksum(bytes, order)?;

    let raw = Raw { bytes, order };
    let bin_header = parse_bin_header(&raw)?;
    let header = parse_wave_header(&raw)?;

    let size = element_size(header.wave_type)?;
    let npnts = header.npnts.max(0) as usize;
    let data_len = npnts * size;
    let block = raw.slice(DATA_OFFSET, data_len, "data block")?;
    let data = decode_data(block, header.wave_type, order)?;

    // Trailing blocks sit in fixed order after the data; sizes come from
    // the bin header. Negative sizes in malformed files read as absent.
    let len = |v: i32| v.max(0) as usize;
    let mut offset = DATA_OFFSET + data_len;
    offset += len(bin_header.formula_size);
    offset += len(bin_header.note_size);
    offset += len(bin_header.data_e_units_size);
    for d in 0..4 {
        offset += len(bin_header.dim_e_units_size[d]);
    }

    let mut dim_labels: [Vec<String>; 4] = Default::default();
    for d in 0..4 {
        let block_len = len(bin_header.dim_labels_size[d]);
        if block_len == 0 {
            continue;
        }
        let block = raw.slice(offset, block_len, "dimension labels")?;
        dim_labels[d] = block.chunks(32).map(padded_str).collect();
        offset += block_len;
    }

    Ok(Wave {
        bin_header,
        header,
        data,
        dim_labels,
    })
}
