//! Depression filling
//!
//! Planchon-Darboux (2001) filling, used to guarantee that every valid
//! cell has a downslope path to the grid edge before direction assignment.
//! A small minimum slope is imposed so filled areas do not become flats.
//!
//! Reference:
//! Planchon, O., Darboux, F. (2001). A fast, simple and versatile
//! algorithm to fill the depressions of digital elevation models.
//! Catena, 46(2-3), 159-176.

use crate::{D8_DIST, D8_OFFSETS};
use hydrotopo_core::{Raster, Result};
use ndarray::Array2;

/// Fill depressions in an elevation surface.
///
/// `min_slope` is the gradient enforced between filled neighbors
/// (per cell of horizontal distance); 0.0 permits flat filled areas.
///
/// Returns a new raster; the input is untouched.
pub fn fill_sinks(dem: &Raster<f64>, min_slope: f64) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.cell_size();
    let epsilon = min_slope * cell_size;

    // W starts at the surface on the border and "infinitely" high inside,
    // then drains iteratively toward the border.
    let big_value = f64::MAX / 2.0;
    let mut w = Array2::from_elem((rows, cols), big_value);

    for row in 0..rows {
        for col in 0..cols {
            let val = unsafe { dem.get_unchecked(row, col) };

            if dem.is_nodata(val) {
                w[(row, col)] = val;
                continue;
            }

            if row == 0 || row == rows - 1 || col == 0 || col == cols - 1 {
                w[(row, col)] = val;
            }
        }
    }

    let mut passes = 0usize;
    let mut changed = true;
    while changed {
        changed = false;
        passes += 1;

        // Forward then backward sweep; alternating direction converges in
        // a handful of passes on real terrain.
        changed |= sweep(dem, &mut w, epsilon, big_value, false);
        changed |= sweep(dem, &mut w, epsilon, big_value, true);
    }

    tracing::debug!(passes, "sink filling converged");

    let mut output = dem.like(0.0);
    *output.data_mut() = w;

    Ok(output)
}

fn sweep(
    dem: &Raster<f64>,
    w: &mut Array2<f64>,
    epsilon: f64,
    big_value: f64,
    reverse: bool,
) -> bool {
    let (rows, cols) = dem.shape();
    let mut changed = false;

    let row_range: Vec<usize> = if reverse {
        (1..rows - 1).rev().collect()
    } else {
        (1..rows - 1).collect()
    };
    let col_range: Vec<usize> = if reverse {
        (1..cols - 1).rev().collect()
    } else {
        (1..cols - 1).collect()
    };

    for &row in &row_range {
        for &col in &col_range {
            let dem_val = unsafe { dem.get_unchecked(row, col) };

            if dem.is_nodata(dem_val) {
                continue;
            }

            if w[(row, col)] <= dem_val {
                continue;
            }

            for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
                let nr = (row as isize + dr) as usize;
                let nc = (col as isize + dc) as usize;
                let eps_d = epsilon * D8_DIST[idx];

                let wn = w[(nr, nc)];
                if wn.is_nan() || wn >= big_value {
                    continue;
                }

                let new_val = wn + eps_d;
                if dem_val >= new_val {
                    w[(row, col)] = dem_val;
                    changed = true;
                    break;
                }
                if w[(row, col)] > new_val {
                    w[(row, col)] = new_val;
                    changed = true;
                }
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hydrotopo_core::GeoTransform;

    fn dem_with_sink() -> Raster<f64> {
        // 7x7 bowl with a pit at the center
        let mut dem = Raster::new(7, 7);
        dem.set_transform(GeoTransform::new(0.0, 7.0, 1.0, -1.0));

        for row in 0..7 {
            for col in 0..7 {
                let ring = row.min(col).min(6 - row).min(6 - col);
                dem.set(row, col, (9 - ring) as f64).unwrap();
            }
        }
        dem.set(3, 3, 3.0).unwrap(); // pit below its neighbors
        dem
    }

    #[test]
    fn test_fill_raises_depression() {
        let dem = dem_with_sink();
        let filled = fill_sinks(&dem, 0.0).unwrap();

        let center = filled.get(3, 3).unwrap();
        assert!(
            center >= 7.0,
            "pit should be filled to its pour point, got {center}"
        );
    }

    #[test]
    fn test_fill_preserves_border() {
        let dem = dem_with_sink();
        let filled = fill_sinks(&dem, 0.0).unwrap();

        assert_eq!(filled.get(0, 0).unwrap(), dem.get(0, 0).unwrap());
        assert_eq!(filled.get(6, 3).unwrap(), dem.get(6, 3).unwrap());
    }

    #[test]
    fn test_fill_no_change_on_clean_surface() {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let filled = fill_sinks(&dem, 0.0).unwrap();
        for row in 0..10 {
            for col in 0..10 {
                assert_eq!(filled.get(row, col).unwrap(), dem.get(row, col).unwrap());
            }
        }
    }

    #[test]
    fn test_fill_respects_nodata() {
        let mut dem = dem_with_sink();
        dem.set_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();

        let filled = fill_sinks(&dem, 0.0).unwrap();
        assert_eq!(filled.get(2, 2).unwrap(), -9999.0);
    }

    #[test]
    fn test_fill_min_slope_gradient() {
        let dem = dem_with_sink();
        let filled = fill_sinks(&dem, 0.01).unwrap();

        // The interior drains over the rim at 9.0, so the center settles
        // at the rim elevation plus one gradient step per cardinal cell
        // of its three-step escape path and routing never sees a flat.
        assert_relative_eq!(filled.get(3, 3).unwrap(), 9.03, epsilon = 1e-9);
    }
}
