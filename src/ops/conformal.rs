//! Conformal layer construction.
//!
//! Approximates a coating of uniform thickness by offsetting the surface
//! mesh along its vertex normals and resampling the offset surface on the
//! original grid with vertical rays. The approximation is good wherever the
//! surface curvature radius is large compared to the thickness.

use serde::Serialize;
use tracing::debug;

use crate::grid::{Axis, Grid2};
use crate::mesh::raycast::VerticalRayIndex;
use crate::mesh::SurfaceMesh;
use crate::ops::{check_axes, Operation, OpsError};

/// Add a conformal layer of `thickness` on top of the surface.
///
/// `scale` is applied to all coordinates before meshing and removed
/// afterwards; meshing is numerically happiest when values are of order 1,
/// so data in meters wants `scale` around `1e9`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConformalLayer {
    pub thickness: f64,
    pub scale: f64,
}

impl ConformalLayer {
    pub fn new(thickness: f64) -> Self {
        Self {
            thickness,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl Operation for ConformalLayer {
    fn name(&self) -> &str {
        "conformal_layer"
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "thickness": self.thickness,
            "scale": self.scale,
        })
    }

    /// Samples of the offset surface at the original grid positions.
    /// Positions the offset surface no longer covers (it shrinks laterally
    /// on slopes) become NaN.
    fn apply(&self, x: &Axis, y: &Axis, data: &Grid2) -> Result<Grid2, OpsError> {
        check_axes(x, y, data)?;
        if self.thickness < 0.0 {
            return Err(OpsError::InvalidThickness(self.thickness));
        }
        if !(self.scale > 0.0) {
            return Err(OpsError::InvalidScale(self.scale));
        }
        if self.thickness == 0.0 {
            return Ok(data.clone());
        }

        let xs = x.scaled(self.scale);
        let ys = y.scaled(self.scale);
        let zs = data.map(|v| v * self.scale);

        // The mesher shifts heights so the minimum sits at zero; keep the
        // shift to restore the input frame afterwards.
        let mesh = SurfaceMesh::from_height_map(&xs, &ys, &zs, None)?;
        let z_min = zs.min_finite().unwrap_or(0.0);

        let offset = mesh.offset_along_normals(self.thickness * self.scale);
        let (rows, cols) = data.shape();
        let index = VerticalRayIndex::build(&offset, rows.max(cols));

        let mut hits = 0usize;
        let result = Grid2::from_fn(rows, cols, |i, j| {
            match index.drop_height(xs.get(i), ys.get(j)) {
                Some(z) => {
                    hits += 1;
                    (z + z_min) / self.scale
                }
                None => f64::NAN,
            }
        });

        debug!(
            thickness = self.thickness,
            scale = self.scale,
            hits,
            misses = rows * cols - hits,
            "Resampled conformal layer"
        );
        Ok(result)
    }
}
