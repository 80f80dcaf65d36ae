//! Triangle meshing of height maps.
//!
//! - [`colormap`]: viridis vertex coloring
//! - [`raycast`]: vertical ray queries against a mesh
//! - [`ply`]: PLY export
//!
//! A height map meshes into one vertex per grid sample and two triangles per
//! grid cell. Vertex normals come from the height gradient, so the mesh can
//! be offset along its normals to approximate a conformal coating.

pub mod colormap;
pub mod ply;
pub mod raycast;

use thiserror::Error;
use tracing::debug;

use crate::grid::{Axis, Grid2};

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("axis lengths ({x}, {y}) do not match data shape {shape:?}")]
    AxisMismatch {
        x: usize,
        y: usize,
        shape: (usize, usize),
    },

    #[error("meshing needs at least 2 samples per side, got {rows}x{cols}")]
    TooSmall { rows: usize, cols: usize },

    #[error("color shape {actual:?} does not match data shape {expected:?}")]
    ColorShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("data has no finite samples")]
    NoFiniteSamples,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A triangle mesh of a scanned surface.
///
/// Vertices are laid out row-major over the source grid
/// (`vertex(i, j) = i * cols + j`); heights are shifted so the smallest
/// finite sample sits at z = 0. Triangles touching a NaN sample are dropped,
/// and the NaN vertices they would have used keep their NaN z (no face
/// references them).
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub vertex_normals: Vec<[f64; 3]>,
    pub vertex_colors: Option<Vec<[u8; 4]>>,
}

impl SurfaceMesh {
    /// Mesh a height map.
    ///
    /// `colors`, when given, is min-max normalized and mapped through
    /// viridis to per-vertex RGBA.
    pub fn from_height_map(
        x: &Axis,
        y: &Axis,
        data: &Grid2,
        colors: Option<&Grid2>,
    ) -> Result<Self, MeshError> {
        let (rows, cols) = data.shape();
        if rows != x.len() || cols != y.len() {
            return Err(MeshError::AxisMismatch {
                x: x.len(),
                y: y.len(),
                shape: data.shape(),
            });
        }
        if rows < 2 || cols < 2 {
            return Err(MeshError::TooSmall { rows, cols });
        }
        if let Some(c) = colors {
            if !c.same_shape(data) {
                return Err(MeshError::ColorShapeMismatch {
                    expected: data.shape(),
                    actual: c.shape(),
                });
            }
        }
        let z_min = data.min_finite().ok_or(MeshError::NoFiniteSamples)?;

        let mut vertices = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                vertices.push([x.get(i), y.get(j), data.get(i, j) - z_min]);
            }
        }

        let dzdx = gradient_rows(data, x);
        let dzdy = gradient_cols(data, y);
        let mut vertex_normals = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                let dx = dzdx.get(i, j);
                let dy = dzdy.get(i, j);
                if dx.is_finite() && dy.is_finite() {
                    let mag = (dx * dx + dy * dy + 1.0).sqrt();
                    vertex_normals.push([-dx / mag, -dy / mag, 1.0 / mag]);
                } else {
                    vertex_normals.push([0.0, 0.0, 1.0]);
                }
            }
        }

        let finite = |i: usize, j: usize| data.get(i, j).is_finite();
        let vid = |i: usize, j: usize| (i * cols + j) as u32;
        let mut faces = Vec::with_capacity((rows - 1) * (cols - 1) * 2);
        for i in 0..rows - 1 {
            for j in 0..cols - 1 {
                // Counter-clockwise seen from +z.
                if finite(i, j) && finite(i + 1, j) && finite(i, j + 1) {
                    faces.push([vid(i, j), vid(i + 1, j), vid(i, j + 1)]);
                }
                if finite(i + 1, j) && finite(i + 1, j + 1) && finite(i, j + 1) {
                    faces.push([vid(i + 1, j), vid(i + 1, j + 1), vid(i, j + 1)]);
                }
            }
        }

        let vertex_colors = colors.map(colormap::map_colors);

        debug!(
            vertices = vertices.len(),
            faces = faces.len(),
            colored = vertex_colors.is_some(),
            "Built surface mesh"
        );

        Ok(Self {
            vertices,
            faces,
            vertex_normals,
            vertex_colors,
        })
    }

    /// A copy of this mesh with every vertex moved `distance` along its
    /// normal. Faces, normals, and colors are retained.
    pub fn offset_along_normals(&self, distance: f64) -> SurfaceMesh {
        let vertices = self
            .vertices
            .iter()
            .zip(&self.vertex_normals)
            .map(|(v, n)| {
                [
                    v[0] + distance * n[0],
                    v[1] + distance * n[1],
                    v[2] + distance * n[2],
                ]
            })
            .collect();
        SurfaceMesh {
            vertices,
            faces: self.faces.clone(),
            vertex_normals: self.vertex_normals.clone(),
            vertex_colors: self.vertex_colors.clone(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// d(data)/dx along rows: second-order central differences on the axis
/// spacing, first-order one-sided at the borders.
fn gradient_rows(data: &Grid2, x: &Axis) -> Grid2 {
    let (rows, cols) = data.shape();
    Grid2::from_fn(rows, cols, |i, j| {
        if rows < 2 {
            return 0.0;
        }
        if i == 0 {
            (data.get(1, j) - data.get(0, j)) / (x.get(1) - x.get(0))
        } else if i == rows - 1 {
            (data.get(i, j) - data.get(i - 1, j)) / (x.get(i) - x.get(i - 1))
        } else {
            central_difference(
                data.get(i - 1, j),
                data.get(i, j),
                data.get(i + 1, j),
                x.get(i) - x.get(i - 1),
                x.get(i + 1) - x.get(i),
            )
        }
    })
}

/// d(data)/dy along columns; same stencil as [`gradient_rows`].
fn gradient_cols(data: &Grid2, y: &Axis) -> Grid2 {
    let (rows, cols) = data.shape();
    Grid2::from_fn(rows, cols, |i, j| {
        if cols < 2 {
            return 0.0;
        }
        if j == 0 {
            (data.get(i, 1) - data.get(i, 0)) / (y.get(1) - y.get(0))
        } else if j == cols - 1 {
            (data.get(i, j) - data.get(i, j - 1)) / (y.get(j) - y.get(j - 1))
        } else {
            central_difference(
                data.get(i, j - 1),
                data.get(i, j),
                data.get(i, j + 1),
                y.get(j) - y.get(j - 1),
                y.get(j + 1) - y.get(j),
            )
        }
    })
}

/// Second-order central difference for (possibly) unequal spacing:
/// `hb` behind the sample, `hf` in front of it.
fn central_difference(prev: f64, here: f64, next: f64, hb: f64, hf: f64) -> f64 {
    (hb * hb * next + (hf * hf - hb * hb) * here - hf * hf * prev) / (hb * hf * (hb + hf))
}
