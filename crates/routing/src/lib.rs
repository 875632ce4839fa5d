//! # hydrotopo Routing
//!
//! Flow-direction and drainage-accumulation backend for the hydrotopo
//! pipeline. The pipeline consumes this capability as a black box through
//! the [`FlowRouter`] trait, so tests can substitute synthetic flow
//! networks; the default [`D8Router`] conditions the surface with
//! Planchon-Darboux sink filling and routes with eight-direction
//! steepest descent.
//!
//! Flow direction encoding (shared with every consumer):
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = pit/flat (no outflow), 1-8 = direction to the steepest neighbor.

pub mod accumulation;
pub mod direction;
pub mod fill;

pub use accumulation::flow_accumulation;
pub use direction::flow_direction;
pub use fill::fill_sinks;

use hydrotopo_core::{Error, Raster, Result};
use serde::Deserialize;

/// D8 neighbor offsets (row, col), indexed to match the direction
/// encoding: 1=E, 2=NE, 3=N, 4=NW, 5=W, 6=SW, 7=S, 8=SE
pub const D8_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Distance factor for each D8 direction (diagonals are sqrt(2) cells)
pub const D8_DIST: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

/// Routing algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingAlgorithm {
    /// Eight-direction steepest descent
    #[default]
    D8,
}

/// Parameters controlling flow routing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingParams {
    /// Routing algorithm
    pub algorithm: RoutingAlgorithm,
    /// Minimum slope enforced while filling, to prevent flat-area
    /// routing failures
    pub min_slope: f64,
    /// Maximum tolerated fraction of valid interior cells left without an
    /// outflow direction after filling; beyond this the router fails
    /// instead of producing degenerate output
    pub max_unresolved: f64,
}

impl Default for RoutingParams {
    fn default() -> Self {
        Self {
            algorithm: RoutingAlgorithm::D8,
            min_slope: 1e-5,
            max_unresolved: 0.01,
        }
    }
}

/// Flow direction and drainage accumulation grids, co-registered with the
/// surface they were routed on
#[derive(Debug, Clone)]
pub struct FlowRouting {
    /// D8 direction codes (0 = pit/flat, 1-8 = outflow direction)
    pub direction: Raster<u8>,
    /// Upstream contributing cell count
    pub accumulation: Raster<f64>,
}

/// Narrow routing seam consumed by the derived-product engine
pub trait FlowRouter {
    /// Route flow over an elevation surface.
    ///
    /// Fails with `Error::Routing` when the surface cannot be resolved
    /// within the backend's fill tolerance; never returns degenerate
    /// direction grids silently.
    fn route(&self, surface: &Raster<f64>, params: &RoutingParams) -> Result<FlowRouting>;
}

/// Default router: Planchon-Darboux fill + D8 steepest descent +
/// topological-order accumulation
#[derive(Debug, Clone, Default)]
pub struct D8Router;

impl FlowRouter for D8Router {
    fn route(&self, surface: &Raster<f64>, params: &RoutingParams) -> Result<FlowRouting> {
        let filled = fill_sinks(surface, params.min_slope)?;
        let direction = flow_direction(&filled)?;

        check_unresolved(&filled, &direction, params.max_unresolved)?;

        let accumulation = flow_accumulation(&direction)?;

        Ok(FlowRouting {
            direction,
            accumulation,
        })
    }
}

/// Count valid interior cells still lacking an outflow direction.
///
/// Border cells legitimately drain off-grid and interior pits next to
/// nodata gaps are expected, so only valid interior cells count.
fn check_unresolved(filled: &Raster<f64>, direction: &Raster<u8>, tolerance: f64) -> Result<()> {
    let (rows, cols) = filled.shape();
    if rows < 3 || cols < 3 {
        return Ok(());
    }

    let mut unresolved = 0usize;
    let mut valid = 0usize;

    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let z = unsafe { filled.get_unchecked(row, col) };
            if filled.is_nodata(z) {
                continue;
            }
            valid += 1;
            if unsafe { direction.get_unchecked(row, col) } == 0 {
                unresolved += 1;
            }
        }
    }

    if valid == 0 {
        return Ok(());
    }

    let fraction = unresolved as f64 / valid as f64;
    if fraction > tolerance {
        return Err(Error::Routing(format!(
            "{unresolved} of {valid} interior cells have no outflow after filling \
             ({:.2}% > {:.2}% tolerance)",
            fraction * 100.0,
            tolerance * 100.0
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrotopo_core::GeoTransform;

    fn south_slope(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, (rows - row) as f64 * 10.0).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_d8_router_resolves_simple_slope() {
        let dem = south_slope(8, 8);
        let routing = D8Router.route(&dem, &RoutingParams::default()).unwrap();

        assert_eq!(routing.direction.shape(), dem.shape());
        assert_eq!(routing.accumulation.shape(), dem.shape());
        // Interior cells on a south slope flow south
        assert_eq!(routing.direction.get(3, 3).unwrap(), 7);
    }

    #[test]
    fn test_router_accumulates_downstream() {
        let dem = south_slope(6, 6);
        let routing = D8Router.route(&dem, &RoutingParams::default()).unwrap();

        // Accumulation grows monotonically down the slope
        let top = routing.accumulation.get(0, 3).unwrap();
        let bottom = routing.accumulation.get(5, 3).unwrap();
        assert_eq!(top, 0.0);
        assert!(bottom > top);
    }

    #[test]
    fn test_routing_params_defaults() {
        let params = RoutingParams::default();
        assert_eq!(params.algorithm, RoutingAlgorithm::D8);
        assert!(params.min_slope > 0.0);
    }
}
