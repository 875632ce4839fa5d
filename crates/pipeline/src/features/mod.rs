//! Derived hydro-topological features
//!
//! One entry point turns a conditioned surface and a water mask into the
//! three model-input grids: HAND, slope and distance to water. Flow
//! routing is delegated through the [`FlowRouter`] seam so the engine
//! never depends on a concrete routing backend.

mod edtw;
mod hand;
mod slope;

pub use edtw::distance_to_water;
pub use hand::height_above_drainage;
pub use slope::slope;

use crate::config::ProcessingConfig;
use hydrotopo_core::{ensure_coregistered, Raster, Result};
use hydrotopo_routing::FlowRouter;
use tracing::info;

/// The three derived feature grids, co-registered with their source
/// surface. All are f64 with NaN nodata.
#[derive(Debug, Clone)]
pub struct DerivedFeatures {
    /// Height above nearest drainage
    pub hand: Raster<f64>,
    /// Terrain slope
    pub slope: Raster<f64>,
    /// Euclidean distance to water
    pub edtw: Raster<f64>,
}

/// Derive HAND, slope and distance-to-water from a conditioned surface
/// and its water mask.
pub fn derive_features(
    conditioned: &Raster<f64>,
    mask: &Raster<u8>,
    router: &dyn FlowRouter,
    config: &ProcessingConfig,
) -> Result<DerivedFeatures> {
    ensure_coregistered(conditioned, mask)?;

    info!("routing flow over the conditioned surface");
    let routing = router.route(conditioned, &config.routing)?;

    info!("computing height above nearest drainage");
    let hand = height_above_drainage(conditioned, &routing.direction, mask)?;

    info!("computing slope");
    let slope = slope::slope(conditioned, &config.slope)?;

    info!("computing distance to water");
    let edtw = distance_to_water(mask, config.edtw.max_distance)?;

    Ok(DerivedFeatures { hand, slope, edtw })
}
