//! D8 flow direction
//!
//! Assigns each cell the direction of its steepest downslope neighbor,
//! normalized by horizontal distance so diagonals compete fairly.

use crate::{D8_DIST, D8_OFFSETS};
use hydrotopo_core::{Raster, Result};
use ndarray::Array2;

/// Compute D8 flow direction from a (filled) elevation surface.
///
/// Direction codes: 0 = pit/flat (no downslope neighbor), 1-8 per the
/// crate-level encoding. Nodata cells get 0 and are skipped entirely.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.cell_size();

    let mut codes = Array2::<u8>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            let center = unsafe { dem.get_unchecked(row, col) };
            if dem.is_nodata(center) {
                continue;
            }

            let mut max_drop = 0.0_f64;
            let mut best_dir: u8 = 0;

            for (idx, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
                let nr = row as isize + dr;
                let nc = col as isize + dc;

                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }

                let neighbor = unsafe { dem.get_unchecked(nr as usize, nc as usize) };
                if dem.is_nodata(neighbor) {
                    continue;
                }

                let distance = D8_DIST[idx] * cell_size;
                let drop = (center - neighbor) / distance;

                if drop > max_drop {
                    max_drop = drop;
                    best_dir = (idx + 1) as u8;
                }
            }

            codes[(row, col)] = best_dir;
        }
    }

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = codes;

    Ok(output)
}
