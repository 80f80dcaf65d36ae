//! Operations on channel data.
//!
//! An [`Operation`] transforms a channel's samples given the scan axes.
//! Applying one through [`Channel::apply`](crate::image::Channel::apply)
//! records it in the channel's history.
//!
//! - [`level`]: MinToZero, PlaneLevel and the underlying plane fit
//! - [`conformal`]: ConformalLayer surface construction

pub mod conformal;
pub mod level;

pub use conformal::ConformalLayer;
pub use level::{MinToZero, Plane, PlaneLevel};

use thiserror::Error;

use crate::grid::{Axis, Grid2};
use crate::linalg::LinalgError;
use crate::mesh::MeshError;

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("axis lengths ({x}, {y}) do not match data shape {shape:?}")]
    AxisMismatch {
        x: usize,
        y: usize,
        shape: (usize, usize),
    },

    #[error("plane fit needs at least 3 finite samples spanning both axes, found {0}")]
    DegenerateFit(usize),

    #[error("thickness can not be negative: {0}")]
    InvalidThickness(f64),

    #[error("scale must be greater than 0: {0}")]
    InvalidScale(f64),

    #[error("plane fit failed: {0}")]
    Solve(#[from] LinalgError),

    #[error("meshing failed: {0}")]
    Mesh(#[from] MeshError),
}

/// A transformation of channel data.
pub trait Operation {
    /// Stable name recorded in channel history.
    fn name(&self) -> &str;

    /// Parameters recorded in channel history.
    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Transform `data` sampled at the positions in `x` and `y`.
    fn apply(&self, x: &Axis, y: &Axis, data: &Grid2) -> Result<Grid2, OpsError>;
}

/// Shared validation: axes must match the data shape.
pub(crate) fn check_axes(x: &Axis, y: &Axis, data: &Grid2) -> Result<(), OpsError> {
    if data.rows() != x.len() || data.cols() != y.len() {
        return Err(OpsError::AxisMismatch {
            x: x.len(),
            y: y.len(),
            shape: data.shape(),
        });
    }
    Ok(())
}
