//! DEM conditioning by stream burning
//!
//! Lowers the elevation surface under mapped water so that flow routing
//! follows the mapped drainage network instead of DEM noise.

use hydrotopo_core::{ensure_coregistered, Error, Raster, Result};
use tracing::debug;

/// Burn water cells into the DEM by a constant depth.
///
/// Returns a new grid; the input DEM is untouched. Nodata cells stay
/// nodata even where the mask marks water, and a zero depth returns a
/// value-identical copy.
pub fn burn_streams(dem: &Raster<f64>, mask: &Raster<u8>, burn_depth: f64) -> Result<Raster<f64>> {
    if burn_depth < 0.0 || !burn_depth.is_finite() {
        return Err(Error::InvalidConfiguration {
            name: "burn_depth",
            value: burn_depth.to_string(),
            reason: "must be a finite value >= 0".into(),
        });
    }

    ensure_coregistered(dem, mask)?;

    let mut burned = dem.clone();
    let mut burned_cells = 0usize;

    let (rows, cols) = dem.shape();
    for row in 0..rows {
        for col in 0..cols {
            if unsafe { mask.get_unchecked(row, col) } != 1 {
                continue;
            }

            let value = unsafe { dem.get_unchecked(row, col) };
            if dem.is_nodata(value) {
                continue;
            }

            unsafe { burned.set_unchecked(row, col, value - burn_depth) };
            burned_cells += 1;
        }
    }

    debug!(burned_cells, burn_depth, "streams burned into DEM");

    Ok(burned)
}
