//! Vertical ray queries against a surface mesh.
//!
//! The conformal-layer resample casts one straight-down ray per grid
//! position. A naive scan touches every triangle per ray, quadratic in the
//! grid size, so triangles are binned into a uniform 2-D grid over the
//! mesh's xy-extent and each query only tests the triangles in its bin.
//!
//! For a vertical ray, triangle intersection reduces to a barycentric
//! point-in-triangle test in the xy projection; the hit height is the
//! barycentric interpolation of the corner heights.

use tracing::debug;

use crate::mesh::SurfaceMesh;

/// Barycentric tolerance: points this close to an edge still count as
/// inside, so rays on shared triangle edges always hit.
const EDGE_EPSILON: f64 = 1e-9;

/// Uniform 2-D bin index over a mesh for vertical ray queries.
#[derive(Debug)]
pub struct VerticalRayIndex {
    min_x: f64,
    min_y: f64,
    cell_x: f64,
    cell_y: f64,
    nx: usize,
    ny: usize,
    bins: Vec<Vec<u32>>,
    triangles: Vec<[[f64; 3]; 3]>,
}

impl VerticalRayIndex {
    /// Index a mesh with roughly `bins_per_side` bins along each axis.
    pub fn build(mesh: &SurfaceMesh, bins_per_side: usize) -> Self {
        let triangles: Vec<[[f64; 3]; 3]> = mesh
            .faces
            .iter()
            .map(|f| {
                [
                    mesh.vertices[f[0] as usize],
                    mesh.vertices[f[1] as usize],
                    mesh.vertices[f[2] as usize],
                ]
            })
            .collect();

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for tri in &triangles {
            for v in tri {
                min_x = min_x.min(v[0]);
                max_x = max_x.max(v[0]);
                min_y = min_y.min(v[1]);
                max_y = max_y.max(v[1]);
            }
        }

        let nx = bins_per_side.max(1);
        let ny = bins_per_side.max(1);
        // Degenerate extents (a single column of triangles) still get one
        // full-width cell.
        let span_x = (max_x - min_x).max(f64::MIN_POSITIVE);
        let span_y = (max_y - min_y).max(f64::MIN_POSITIVE);
        let cell_x = span_x / nx as f64;
        let cell_y = span_y / ny as f64;

        let mut bins = vec![Vec::new(); nx * ny];
        if triangles.is_empty() {
            return Self {
                min_x: 0.0,
                min_y: 0.0,
                cell_x: 1.0,
                cell_y: 1.0,
                nx,
                ny,
                bins,
                triangles,
            };
        }

        let clamp_bin = |v: f64, min: f64, cell: f64, n: usize| -> usize {
            (((v - min) / cell).floor() as isize).clamp(0, n as isize - 1) as usize
        };
        for (t, tri) in triangles.iter().enumerate() {
            let (mut lo_x, mut hi_x) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut lo_y, mut hi_y) = (f64::INFINITY, f64::NEG_INFINITY);
            for v in tri {
                lo_x = lo_x.min(v[0]);
                hi_x = hi_x.max(v[0]);
                lo_y = lo_y.min(v[1]);
                hi_y = hi_y.max(v[1]);
            }
            let bx0 = clamp_bin(lo_x, min_x, cell_x, nx);
            let bx1 = clamp_bin(hi_x, min_x, cell_x, nx);
            let by0 = clamp_bin(lo_y, min_y, cell_y, ny);
            let by1 = clamp_bin(hi_y, min_y, cell_y, ny);
            for bx in bx0..=bx1 {
                for by in by0..=by1 {
                    bins[bx * ny + by].push(t as u32);
                }
            }
        }

        debug!(
            triangles = triangles.len(),
            bins = nx * ny,
            "Built vertical ray index"
        );

        Self {
            min_x,
            min_y,
            cell_x,
            cell_y,
            nx,
            ny,
            bins,
            triangles,
        }
    }

    /// Height of the surface under a vertical ray at `(x, y)`.
    ///
    /// Returns the highest intersection (the first hit of a downward ray
    /// from above the mesh), or None if no triangle covers the position.
    pub fn drop_height(&self, x: f64, y: f64) -> Option<f64> {
        if self.triangles.is_empty() {
            return None;
        }
        // Clamp into range so queries on the exact max edge land in the
        // last bin; points truly outside miss every triangle there anyway.
        let bx = (((x - self.min_x) / self.cell_x).floor() as isize)
            .clamp(0, self.nx as isize - 1) as usize;
        let by = (((y - self.min_y) / self.cell_y).floor() as isize)
            .clamp(0, self.ny as isize - 1) as usize;
        let bin = &self.bins[bx * self.ny + by];

        let mut best: Option<f64> = None;
        for &t in bin {
            if let Some(z) = vertical_hit(&self.triangles[t as usize], x, y) {
                best = Some(best.map_or(z, |b: f64| b.max(z)));
            }
        }
        best
    }
}

/// Intersection height of the vertical line at `(x, y)` with a triangle, if
/// the line passes through it.
fn vertical_hit(tri: &[[f64; 3]; 3], x: f64, y: f64) -> Option<f64> {
    let [a, b, c] = tri;
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if det.abs() < f64::MIN_POSITIVE {
        // Triangle is edge-on in the xy projection.
        return None;
    }
    let l0 = ((b[1] - c[1]) * (x - c[0]) + (c[0] - b[0]) * (y - c[1])) / det;
    let l1 = ((c[1] - a[1]) * (x - c[0]) + (a[0] - c[0]) * (y - c[1])) / det;
    let l2 = 1.0 - l0 - l1;
    if l0 < -EDGE_EPSILON || l1 < -EDGE_EPSILON || l2 < -EDGE_EPSILON {
        return None;
    }
    Some(l0 * a[2] + l1 * b[2] + l2 * c[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Axis, Grid2};

    fn flat_mesh(rows: usize, cols: usize, height: f64) -> SurfaceMesh {
        let x = Axis::linspace(0.0, (rows - 1) as f64, rows);
        let y = Axis::linspace(0.0, (cols - 1) as f64, cols);
        // Two levels so min-shift keeps `height` observable.
        let mut data = Grid2::filled(rows, cols, height);
        data.set(0, 0, 0.0);
        SurfaceMesh::from_height_map(&x, &y, &data, None).unwrap()
    }

    #[test]
    fn test_drop_height_on_flat_surface() {
        let mesh = flat_mesh(4, 4, 2.0);
        let index = VerticalRayIndex::build(&mesh, 4);
        // Away from the dented corner the surface sits at z = 2.
        let z = index.drop_height(2.2, 2.7).unwrap();
        assert!((z - 2.0).abs() < 1e-9, "z = {z}");
    }

    #[test]
    fn test_drop_height_on_vertex_and_edge() {
        let mesh = flat_mesh(4, 4, 1.0);
        let index = VerticalRayIndex::build(&mesh, 4);
        // Exactly on a grid vertex.
        assert!((index.drop_height(2.0, 2.0).unwrap() - 1.0).abs() < 1e-9);
        // Exactly on a shared triangle edge.
        assert!((index.drop_height(2.5, 2.5).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_height_outside_extent() {
        let mesh = flat_mesh(3, 3, 1.0);
        let index = VerticalRayIndex::build(&mesh, 3);
        assert!(index.drop_height(-1.0, 1.0).is_none());
        assert!(index.drop_height(1.0, 99.0).is_none());
    }

    #[test]
    fn test_sloped_surface_interpolates() {
        let x = Axis::linspace(0.0, 3.0, 4);
        let y = Axis::linspace(0.0, 3.0, 4);
        // z = x, min-shift is zero.
        let data = Grid2::from_fn(4, 4, |i, _| x.get(i));
        let mesh = SurfaceMesh::from_height_map(&x, &y, &data, None).unwrap();
        let index = VerticalRayIndex::build(&mesh, 4);
        let z = index.drop_height(1.5, 0.25).unwrap();
        assert!((z - 1.5).abs() < 1e-9, "z = {z}");
    }
}
