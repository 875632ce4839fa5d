//! Terrain slope
//!
//! Horn (1981) 3x3 slope over the conditioned surface. Edge and corner
//! cells use a clamped neighborhood (off-grid neighbors collapse onto
//! the nearest valid index) so the output has no edge nodata collar.
//! Nodata neighbors are substituted with the center value.

use crate::config::{SlopeOptions, SlopeUnits};
use hydrotopo_core::{Raster, Result};

/// Compute slope from an elevation surface.
///
/// Output units follow `options.units`; cells that are nodata in the
/// input are NaN in the output, and no other cell is.
pub fn slope(surface: &Raster<f64>, options: &SlopeOptions) -> Result<Raster<f64>> {
    let (rows, cols) = surface.shape();
    let cell_size = surface.cell_size() * options.z_factor;

    let mut output = surface.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            let center = unsafe { surface.get_unchecked(row, col) };

            if surface.is_nodata(center) {
                unsafe { output.set_unchecked(row, col, f64::NAN) };
                continue;
            }

            let rm = row.saturating_sub(1);
            let rp = (row + 1).min(rows - 1);
            let cm = col.saturating_sub(1);
            let cp = (col + 1).min(cols - 1);

            let at = |r: usize, c: usize| -> f64 {
                let v = unsafe { surface.get_unchecked(r, c) };
                if surface.is_nodata(v) {
                    center
                } else {
                    v
                }
            };

            let a = at(rm, cm);
            let b = at(rm, col);
            let c = at(rm, cp);
            let d = at(row, cm);
            let f = at(row, cp);
            let g = at(rp, cm);
            let h = at(rp, col);
            let i = at(rp, cp);

            // Clamped neighborhoods shrink the horizontal span at edges
            let span_x = (cp - cm) as f64 * cell_size;
            let span_y = (rp - rm) as f64 * cell_size;

            let dz_dx = if span_x > 0.0 {
                ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (4.0 * span_x)
            } else {
                0.0
            };
            let dz_dy = if span_y > 0.0 {
                ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (4.0 * span_y)
            } else {
                0.0
            };

            let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();

            let value = match options.units {
                SlopeUnits::Degrees => rise.atan().to_degrees(),
                SlopeUnits::Percent => rise * 100.0,
            };

            unsafe { output.set_unchecked(row, col, value) };
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrotopo_core::GeoTransform;

    fn surface(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flat_surface_zero_slope() {
        let dem = surface(5, 5, |_, _| 42.0);
        let result = slope(&dem, &SlopeOptions::default()).unwrap();

        for row in 0..5 {
            for col in 0..5 {
                assert_eq!(result.get(row, col).unwrap(), 0.0);
            }
        }
    }

    #[test]
    fn test_forty_five_degree_ramp() {
        // dz/dx = 1 with cell size 1
        let dem = surface(5, 5, |_, col| col as f64);
        let result = slope(&dem, &SlopeOptions::default()).unwrap();

        assert_relative_eq!(result.get(2, 2).unwrap(), 45.0, epsilon = 1e-9);
        // Clamped edge neighborhood still sees the same gradient
        assert_relative_eq!(result.get(2, 0).unwrap(), 45.0, epsilon = 1e-9);
        assert_relative_eq!(result.get(0, 0).unwrap(), 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_percent_units() {
        let dem = surface(5, 5, |_, col| col as f64 * 0.5);
        let options = SlopeOptions {
            units: SlopeUnits::Percent,
            z_factor: 1.0,
        };

        let result = slope(&dem, &options).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_edge_nodata() {
        let dem = surface(3, 3, |row, col| (row * 3 + col) as f64);
        let result = slope(&dem, &SlopeOptions::default()).unwrap();

        for row in 0..3 {
            for col in 0..3 {
                assert!(
                    result.get(row, col).unwrap().is_finite(),
                    "edge cell ({row},{col}) must be valid"
                );
            }
        }
    }

    #[test]
    fn test_nodata_center_is_nan_and_neighbors_substitute() {
        let mut dem = surface(5, 5, |_, col| col as f64);
        dem.set_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();

        let result = slope(&dem, &SlopeOptions::default()).unwrap();

        assert!(result.get(2, 2).unwrap().is_nan());
        // Neighbor of the gap still gets a finite value
        assert!(result.get(2, 1).unwrap().is_finite());
    }

    #[test]
    fn test_z_factor_scales_gradient() {
        let dem = surface(5, 5, |_, col| col as f64);
        let options = SlopeOptions {
            units: SlopeUnits::Percent,
            z_factor: 2.0,
        };

        // Doubling the horizontal scale halves the gradient
        let result = slope(&dem, &options).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_cell_grid() {
        let dem = surface(1, 1, |_, _| 7.0);
        let result = slope(&dem, &SlopeOptions::default()).unwrap();
        assert_eq!(result.get(0, 0).unwrap(), 0.0);
    }
}
