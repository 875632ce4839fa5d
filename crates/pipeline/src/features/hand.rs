//! Height Above Nearest Drainage
//!
//! For every valid cell, the elevation difference between the cell and
//! the first water cell reached by walking its flow path downstream.
//! Paths are cached: once a cell's drainage elevation is known, every
//! path passing through it resolves without re-tracing.

use hydrotopo_core::{ensure_coregistered, Raster, Result};
use hydrotopo_routing::D8_OFFSETS;
use ndarray::Array2;
use tracing::debug;

/// Compute HAND from a surface, its flow-direction grid and a water mask.
///
/// Cells whose flow path never reaches water (and nodata cells) are NaN
/// in the output. Negative differences are clamped to zero so HAND stays
/// a height.
pub fn height_above_drainage(
    surface: &Raster<f64>,
    direction: &Raster<u8>,
    mask: &Raster<u8>,
) -> Result<Raster<f64>> {
    ensure_coregistered(surface, direction)?;
    ensure_coregistered(surface, mask)?;

    let (rows, cols) = surface.shape();

    // Drainage elevation per cell; NaN = path does not reach water
    let mut drainage = Array2::from_elem((rows, cols), f64::NAN);
    let mut resolved = Array2::from_elem((rows, cols), false);

    let mut path: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if resolved[(row, col)] {
                continue;
            }

            let z = unsafe { surface.get_unchecked(row, col) };
            if surface.is_nodata(z) {
                resolved[(row, col)] = true;
                continue;
            }

            path.clear();
            let mut cur = (row, col);

            let drain_elev = loop {
                if resolved[cur] {
                    break drainage[cur];
                }

                let z_cur = unsafe { surface.get_unchecked(cur.0, cur.1) };

                if unsafe { mask.get_unchecked(cur.0, cur.1) } == 1 {
                    drainage[cur] = z_cur;
                    resolved[cur] = true;
                    break z_cur;
                }

                path.push(cur);
                if path.len() > rows * cols {
                    break f64::NAN;
                }

                let dir = unsafe { direction.get_unchecked(cur.0, cur.1) };
                if dir == 0 || dir > 8 {
                    break f64::NAN;
                }

                let (dr, dc) = D8_OFFSETS[(dir - 1) as usize];
                let nr = cur.0 as isize + dr;
                let nc = cur.1 as isize + dc;

                if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                    break f64::NAN;
                }

                let next = (nr as usize, nc as usize);
                let z_next = unsafe { surface.get_unchecked(next.0, next.1) };
                if surface.is_nodata(z_next) {
                    break f64::NAN;
                }

                cur = next;
            };

            for &p in &path {
                drainage[p] = drain_elev;
                resolved[p] = true;
            }
        }
    }

    let mut output = surface.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));

    let mut disconnected = 0usize;
    for row in 0..rows {
        for col in 0..cols {
            let z = unsafe { surface.get_unchecked(row, col) };

            let value = if surface.is_nodata(z) {
                f64::NAN
            } else {
                let ze = drainage[(row, col)];
                if ze.is_nan() {
                    disconnected += 1;
                    f64::NAN
                } else {
                    (z - ze).max(0.0)
                }
            };

            unsafe { output.set_unchecked(row, col, value) };
        }
    }

    if disconnected > 0 {
        debug!(disconnected, "cells with no flow path to water");
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrotopo_core::GeoTransform;
    use hydrotopo_routing::flow_direction;

    fn south_slope_with_water(rows: usize, cols: usize) -> (Raster<f64>, Raster<u8>, Raster<u8>) {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, (rows - row) as f64 * 10.0).unwrap();
            }
        }

        let fdir = flow_direction(&dem).unwrap();

        // River along the bottom row
        let mut mask: Raster<u8> = dem.with_same_meta(rows, cols);
        for col in 0..cols {
            mask.set(rows - 1, col, 1).unwrap();
        }

        (dem, fdir, mask)
    }

    #[test]
    fn test_hand_on_uniform_slope() {
        let (dem, fdir, mask) = south_slope_with_water(5, 3);
        let hand = height_above_drainage(&dem, &fdir, &mask).unwrap();

        // Water row elevation is 10; every cell's HAND is its height over it
        assert_eq!(hand.get(4, 1).unwrap(), 0.0);
        assert_eq!(hand.get(3, 1).unwrap(), 10.0);
        assert_eq!(hand.get(0, 1).unwrap(), 40.0);
    }

    #[test]
    fn test_water_cells_are_zero() {
        let (dem, fdir, mask) = south_slope_with_water(5, 3);
        let hand = height_above_drainage(&dem, &fdir, &mask).unwrap();

        for col in 0..3 {
            assert_eq!(hand.get(4, col).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_disconnected_cell_is_nan() {
        let (dem, mut fdir, mask) = south_slope_with_water(5, 3);
        // Cut one cell off the network
        fdir.set(2, 1, 0).unwrap();

        let hand = height_above_drainage(&dem, &fdir, &mask).unwrap();
        assert!(hand.get(2, 1).unwrap().is_nan());
        // Downstream-of-the-cut cells still resolve
        assert_eq!(hand.get(3, 1).unwrap(), 10.0);
    }

    #[test]
    fn test_negative_difference_clamped() {
        // Cell at 90 drains east into water at 100
        let mut dem = Raster::filled(1, 2, 90.0);
        dem.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        dem.set(0, 1, 100.0).unwrap();

        let mut fdir: Raster<u8> = dem.with_same_meta(1, 2);
        fdir.set(0, 0, 1).unwrap();

        let mut mask: Raster<u8> = dem.with_same_meta(1, 2);
        mask.set(0, 1, 1).unwrap();

        let hand = height_above_drainage(&dem, &fdir, &mask).unwrap();
        assert_eq!(hand.get(0, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_nodata_propagates() {
        let (mut dem, fdir, mask) = south_slope_with_water(5, 3);
        dem.set_nodata(Some(-9999.0));
        dem.set(1, 1, -9999.0).unwrap();

        let hand = height_above_drainage(&dem, &fdir, &mask).unwrap();
        assert!(hand.get(1, 1).unwrap().is_nan());
    }
}
