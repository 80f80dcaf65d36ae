//! Loading MFP-3D scans.
//!
//! The MFP-3D saves each scan as one 3-D Igor binary wave of
//! rows x columns x channels, with the channel names stored as the third
//! dimension's labels and the scan geometry in the wave's per-dimension
//! scale factors.
//!
//! - [`ibw`]: the Igor Binary Wave v5 container format

pub mod ibw;

pub use ibw::IbwError;

use std::path::Path;

use tracing::{debug, info};

use crate::grid::{Axis, Grid2};
use crate::image::{Image, ImageGroup, ImageMeta};
use ibw::Wave;

/// Load an `.ibw` image from the MFP-3D.
pub fn load_ibw(path: &Path) -> Result<Image, IbwError> {
    let bytes = std::fs::read(path)?;
    let image = image_from_bytes(&bytes)?;

    info!(
        path = %path.display(),
        shape = ?image.shape(),
        channels = image.labels().len(),
        "Loaded MFP-3D image"
    );
    Ok(image)
}

/// Parse an in-memory `.ibw` file into an [`Image`].
pub fn image_from_bytes(bytes: &[u8]) -> Result<Image, IbwError> {
    image_from_wave(ibw::parse(bytes)?)
}

fn image_from_wave(wave: Wave) -> Result<Image, IbwError> {
    let n_dim = wave.header.n_dim;
    if n_dim[0] < 1 || n_dim[1] < 1 || n_dim[2] < 1 || n_dim[3] != 0 {
        return Err(IbwError::NotAnImage(n_dim));
    }
    let rows = n_dim[0] as usize;
    let cols = n_dim[1] as usize;
    let channels = n_dim[2] as usize;
    if wave.data.len() < rows * cols * channels {
        return Err(IbwError::Truncated {
            what: "wave data",
            needed: rows * cols * channels,
            available: wave.data.len(),
        });
    }

    // Axes from the wave's scale factors: start sfB, step sfA, endpoint
    // included.
    let x = Axis::linspace(
        wave.header.sf_b[0],
        wave.header.sf_b[0] + wave.header.sf_a[0] * rows as f64,
        rows,
    );
    let y = Axis::linspace(
        wave.header.sf_b[1],
        wave.header.sf_b[1] + wave.header.sf_a[1] * cols as f64,
        cols,
    );

    // Channel names are the layer labels: entry 0 of a label block names
    // the dimension itself, entries 1.. name the layers.
    let layer_labels = &wave.dim_labels[2];
    if layer_labels.len() < channels + 1 {
        return Err(IbwError::MissingLabels);
    }
    let labels: Vec<String> = layer_labels[1..=channels].to_vec();

    let grids: Vec<Grid2> = (0..channels)
        .map(|c| {
            Grid2::from_fn(rows, cols, |i, j| {
                // Igor column-major: dimension 0 varies fastest.
                wave.data[i + rows * (j + cols * c)]
            })
        })
        .collect();

    debug!(
        name = %wave.header.name,
        rows,
        cols,
        channels,
        wave_type = wave.header.wave_type,
        "Assembled image from wave"
    );

    let meta = ImageMeta {
        name: wave.header.name.clone(),
        data_units: wave.header.data_units.clone(),
        x_units: wave.header.dim_units[0].clone(),
        y_units: wave.header.dim_units[1].clone(),
    };
    Ok(Image::new(x, y, grids, labels)?.with_meta(meta))
}

/// Load every `*.ibw` file in a directory into an [`ImageGroup`], named by
/// file stem, in lexical order.
pub fn load_dir(path: &Path) -> Result<ImageGroup, IbwError> {
    let mut paths: Vec<_> = std::fs::read_dir(path)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("ibw"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut group = ImageGroup::new();
    for file in &paths {
        let image = load_ibw(file)?;
        let name = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        group.insert(name, image);
    }

    info!(
        path = %path.display(),
        images = group.len(),
        "Loaded image group"
    );
    Ok(group)
}
