//! Leveling operations.
//!
//! AFM height data arrives with an arbitrary offset and usually a sample
//! tilt. [`MinToZero`] removes the offset; [`PlaneLevel`] removes the tilt
//! by subtracting the least-squares plane.

use serde::Serialize;

use crate::grid::{Axis, Grid2};
use crate::linalg;
use crate::ops::{check_axes, Operation, OpsError};

/// Translate data so the smallest finite sample becomes 0.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MinToZero;

impl Operation for MinToZero {
    fn name(&self) -> &str {
        "min_to_zero"
    }

    fn apply(&self, x: &Axis, y: &Axis, data: &Grid2) -> Result<Grid2, OpsError> {
        check_axes(x, y, data)?;
        match data.min_finite() {
            Some(min) => Ok(data.map(|v| v - min)),
            // All-NaN data has no minimum to move.
            None => Ok(data.clone()),
        }
    }
}

/// The plane `z = a*x + b*y + c`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Plane {
    /// Height of the plane at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }
}

/// Least-squares plane over the finite samples of `data`.
///
/// Coordinates are centered and rescaled to unit range before solving the
/// normal equations, so physical axes (nanometers to millimeters) stay well
/// conditioned. NaN samples are excluded from the fit.
pub fn fit_plane(x: &Axis, y: &Axis, data: &Grid2) -> Result<Plane, OpsError> {
    check_axes(x, y, data)?;

    let mut n = 0usize;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_z = 0.0;
    for (i, j, z) in data.iter_indexed() {
        if z.is_finite() {
            n += 1;
            sum_x += x.get(i);
            sum_y += y.get(j);
            sum_z += z;
        }
    }
    if n < 3 {
        return Err(OpsError::DegenerateFit(n));
    }
    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;
    let mean_z = sum_z / n as f64;

    let mut span_x = 0.0f64;
    let mut span_y = 0.0f64;
    for (i, j, z) in data.iter_indexed() {
        if z.is_finite() {
            span_x = span_x.max((x.get(i) - mean_x).abs());
            span_y = span_y.max((y.get(j) - mean_y).abs());
        }
    }
    if span_x == 0.0 || span_y == 0.0 {
        // The finite samples lie on a single row or column.
        return Err(OpsError::DegenerateFit(n));
    }

    // Normal equations in normalized coordinates u = (x - x̄)/sx,
    // v = (y - ȳ)/sy against w = z - z̄.
    let mut suu = 0.0;
    let mut suv = 0.0;
    let mut svv = 0.0;
    let mut su = 0.0;
    let mut sv = 0.0;
    let mut suw = 0.0;
    let mut svw = 0.0;
    let mut sw = 0.0;
    for (i, j, z) in data.iter_indexed() {
        if !z.is_finite() {
            continue;
        }
        let u = (x.get(i) - mean_x) / span_x;
        let v = (y.get(j) - mean_y) / span_y;
        let w = z - mean_z;
        suu += u * u;
        suv += u * v;
        svv += v * v;
        su += u;
        sv += v;
        suw += u * w;
        svw += v * w;
        sw += w;
    }

    let a_mat = vec![
        suu, suv, su, //
        suv, svv, sv, //
        su, sv, n as f64,
    ];
    let rhs = vec![suw, svw, sw];
    let coeffs = linalg::solve(a_mat, rhs)?;

    let a = coeffs[0] / span_x;
    let b = coeffs[1] / span_y;
    let c = mean_z + coeffs[2] - a * mean_x - b * mean_y;
    Ok(Plane { a, b, c })
}

/// Subtract the least-squares plane from the data.
///
/// NaN samples are excluded from the fit and stay NaN in the output.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlaneLevel;

impl Operation for PlaneLevel {
    fn name(&self) -> &str {
        "plane_level"
    }

    fn apply(&self, x: &Axis, y: &Axis, data: &Grid2) -> Result<Grid2, OpsError> {
        let plane = fit_plane(x, y, data)?;
        Ok(Grid2::from_fn(data.rows(), data.cols(), |i, j| {
            data.get(i, j) - plane.eval(x.get(i), y.get(j))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_to_zero() {
        let x = Axis::linspace(0.0, 1.0, 2);
        let y = Axis::linspace(0.0, 1.0, 2);
        let data = Grid2::from_vec(2, 2, vec![5.0, 7.0, 6.0, 9.0]).unwrap();
        let res = MinToZero.apply(&x, &y, &data).unwrap();
        assert_eq!(res.min_finite(), Some(0.0));
        assert_eq!(res.get(1, 1), 4.0);
    }

    #[test]
    fn test_min_to_zero_ignores_nan() {
        let x = Axis::linspace(0.0, 1.0, 2);
        let y = Axis::linspace(0.0, 1.0, 2);
        let data = Grid2::from_vec(2, 2, vec![f64::NAN, 7.0, 6.0, 9.0]).unwrap();
        let res = MinToZero.apply(&x, &y, &data).unwrap();
        assert_eq!(res.get(0, 1), 1.0);
        assert!(res.get(0, 0).is_nan());
    }

    #[test]
    fn test_plane_level_exact_plane() {
        let x = Axis::linspace(0.0, 2.0, 3);
        let y = Axis::linspace(3.0, 5.0, 3);
        // z = 2x - y + 4
        let data = Grid2::from_fn(3, 3, |i, j| 2.0 * x.get(i) - y.get(j) + 4.0);
        let res = PlaneLevel.apply(&x, &y, &data).unwrap();
        for &v in res.values() {
            assert!(v.abs() < 1e-9, "residual {v}");
        }
    }

    #[test]
    fn test_plane_level_physical_units() {
        // Micrometer-scale axes must not trip the solver's pivot threshold.
        let x = Axis::linspace(0.0, 10e-6, 16);
        let y = Axis::linspace(0.0, 10e-6, 16);
        let data = Grid2::from_fn(16, 16, |i, j| {
            1e3 * x.get(i) + 2e3 * y.get(j) + 5e-9
        });
        let res = PlaneLevel.apply(&x, &y, &data).unwrap();
        for &v in res.values() {
            assert!(v.abs() < 1e-12, "residual {v}");
        }
    }

    #[test]
    fn test_plane_level_keeps_nan() {
        let x = Axis::linspace(0.0, 3.0, 4);
        let y = Axis::linspace(0.0, 3.0, 4);
        let mut data = Grid2::from_fn(4, 4, |i, j| x.get(i) + y.get(j));
        data.set(2, 1, f64::NAN);
        let res = PlaneLevel.apply(&x, &y, &data).unwrap();
        assert!(res.get(2, 1).is_nan());
        assert!(res.get(0, 0).abs() < 1e-9);
        assert!(res.get(3, 3).abs() < 1e-9);
    }

    #[test]
    fn test_fit_plane_degenerate() {
        let x = Axis::linspace(0.0, 1.0, 2);
        let y = Axis::linspace(0.0, 1.0, 2);
        let data = Grid2::filled(2, 2, f64::NAN);
        assert!(matches!(
            fit_plane(&x, &y, &data),
            Err(OpsError::DegenerateFit(0))
        ));

        // Finite samples confined to one row can not pin down the y slope.
        let mut one_row = Grid2::filled(2, 2, f64::NAN);
        one_row.set(0, 0, 1.0);
        one_row.set(0, 1, 2.0);
        assert!(matches!(
            fit_plane(&x, &y, &one_row),
            Err(OpsError::DegenerateFit(_))
        ));
    }
}
