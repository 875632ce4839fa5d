//! Co-registration validation
//!
//! Several pipeline stages depend on two grids referring to the same
//! ground locations cell-for-cell (mask vs. elevation, routing outputs
//! vs. conditioned surface). The check recurs, so it lives here once and
//! returns the typed mismatch error instead of ad hoc comparisons.

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};

/// Tolerance for comparing transform coefficients. Tight enough to catch
/// genuinely different grids, loose enough for float drift introduced by
/// raster writers.
const TRANSFORM_EPSILON: f64 = 1e-6;

/// Verify that two grids are co-registered: identical shape, matching
/// transform (within tolerance) and equivalent CRS.
///
/// CRS equivalence is only enforced when both grids declare one; grids
/// produced in-memory during tests commonly carry no CRS.
pub fn ensure_coregistered<A, B>(a: &Raster<A>, b: &Raster<B>) -> Result<()>
where
    A: RasterElement,
    B: RasterElement,
{
    if a.shape() != b.shape() {
        let (ar, ac) = a.shape();
        let (br, bc) = b.shape();
        return Err(Error::GridMismatch(format!(
            "shape ({ar}, {ac}) vs ({br}, {bc})"
        )));
    }

    if !a.transform().approx_eq(b.transform(), TRANSFORM_EPSILON) {
        return Err(Error::GridMismatch(format!(
            "transform {:?} vs {:?}",
            a.transform(),
            b.transform()
        )));
    }

    if let (Some(ca), Some(cb)) = (a.crs(), b.crs()) {
        if !ca.is_equivalent(cb) {
            return Err(Error::GridMismatch(format!(
                "CRS {} vs {}",
                ca.identifier(),
                cb.identifier()
            )));
        }
    }

    Ok(())
}
