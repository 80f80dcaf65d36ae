//! Viridis vertex coloring.
//!
//! A 16-anchor linear interpolation of the viridis colormap. Values are
//! min-max normalized before lookup; NaN maps to transparent black.

use crate::grid::Grid2;

/// Viridis sampled at 16 evenly spaced positions.
const VIRIDIS: [[u8; 3]; 16] = [
    [68, 1, 84],
    [72, 26, 108],
    [71, 47, 125],
    [65, 68, 135],
    [57, 86, 140],
    [49, 104, 142],
    [42, 120, 142],
    [35, 136, 142],
    [31, 152, 139],
    [34, 168, 132],
    [53, 183, 121],
    [84, 197, 104],
    [122, 209, 81],
    [165, 219, 54],
    [210, 226, 27],
    [253, 231, 37],
];

/// Viridis color for `t` in `[0, 1]` (clamped).
pub fn viridis(t: f64) -> [u8; 3] {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(VIRIDIS.len() - 1);
    let frac = pos - lo as f64;
    let mut rgb = [0u8; 3];
    for k in 0..3 {
        let a = VIRIDIS[lo][k] as f64;
        let b = VIRIDIS[hi][k] as f64;
        rgb[k] = (a + (b - a) * frac).round() as u8;
    }
    rgb
}

/// Map a grid of color values to per-vertex RGBA, row-major.
///
/// Values are normalized over the finite min/max; a constant grid maps to
/// the middle of the colormap. NaN values become transparent black.
pub fn map_colors(values: &Grid2) -> Vec<[u8; 4]> {
    let min = values.min_finite();
    let max = values.max_finite();
    values
        .values()
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return [0, 0, 0, 0];
            }
            let t = match (min, max) {
                (Some(lo), Some(hi)) if hi > lo => (v - lo) / (hi - lo),
                _ => 0.5,
            };
            let [r, g, b] = viridis(t);
            [r, g, b, 255]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), [68, 1, 84]);
        assert_eq!(viridis(1.0), [253, 231, 37]);
        // Clamped outside the range.
        assert_eq!(viridis(-4.0), [68, 1, 84]);
        assert_eq!(viridis(7.0), [253, 231, 37]);
    }

    #[test]
    fn test_map_colors_normalizes() {
        let g = Grid2::from_vec(1, 3, vec![10.0, f64::NAN, 20.0]).unwrap();
        let colors = map_colors(&g);
        assert_eq!(colors[0], [68, 1, 84, 255]);
        assert_eq!(colors[1], [0, 0, 0, 0]);
        assert_eq!(colors[2], [253, 231, 37, 255]);
    }

    #[test]
    fn test_map_colors_constant() {
        let g = Grid2::filled(2, 2, 3.0);
        let colors = map_colors(&g);
        let mid = viridis(0.5);
        for c in colors {
            assert_eq!(&c[..3], &mid);
            assert_eq!(c[3], 255);
        }
    }
}
