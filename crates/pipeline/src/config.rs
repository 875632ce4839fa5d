//! Processing configuration
//!
//! One immutable value passed into every component entry point. No
//! module-level defaults are consulted at runtime, so independent site
//! runs can carry different configurations side by side.

use hydrotopo_core::{Error, Result};
use hydrotopo_routing::RoutingParams;
use serde::Deserialize;

/// Unit of the input elevation samples.
///
/// Some national DEM distributions ship centimeter-valued tiles; the
/// original data source here is one of them. The conversion is an
/// explicit switch rather than a value heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationUnit {
    #[default]
    Meters,
    Centimeters,
}

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent (0-infinity)
    Percent,
}

/// Parameters for slope computation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlopeOptions {
    /// Output units
    pub units: SlopeUnits,
    /// Z-factor for vertical/horizontal unit mismatch
    /// (use ~111320 for lat/lon grids with meter elevations)
    pub z_factor: f64,
}

impl Default for SlopeOptions {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Degrees,
            z_factor: 1.0,
        }
    }
}

/// Parameters for the Euclidean distance to water transform
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EdtwOptions {
    /// Optional cap in meters; distances beyond it are truncated to the
    /// cap value, not set to nodata
    pub max_distance: Option<f64>,
}

/// Pipeline processing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Stream burn depth in meters
    pub burn_depth: f64,
    /// No-data sentinel for elevation grids
    pub nodata: f64,
    /// Default CRS (EPSG code) assumed for inputs without one
    pub default_epsg: u32,
    /// Target cell size in grid units when inputs must be resampled
    pub rasterize_resolution: f64,
    /// Unit of input elevation samples
    pub elevation_unit: ElevationUnit,
    /// Flow routing parameters
    pub routing: RoutingParams,
    /// Slope computation parameters
    pub slope: SlopeOptions,
    /// Distance transform parameters
    pub edtw: EdtwOptions,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            burn_depth: 20.0,
            nodata: -9999.0,
            default_epsg: 4326,
            rasterize_resolution: 30.0,
            elevation_unit: ElevationUnit::Meters,
            routing: RoutingParams::default(),
            slope: SlopeOptions::default(),
            edtw: EdtwOptions::default(),
        }
    }
}

impl ProcessingConfig {
    /// Validate configuration values before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.burn_depth < 0.0 || !self.burn_depth.is_finite() {
            return Err(Error::InvalidConfiguration {
                name: "burn_depth",
                value: self.burn_depth.to_string(),
                reason: "must be a finite value >= 0".into(),
            });
        }

        if !self.nodata.is_finite() {
            return Err(Error::InvalidConfiguration {
                name: "nodata",
                value: self.nodata.to_string(),
                reason: "must be finite".into(),
            });
        }

        if self.rasterize_resolution <= 0.0 || !self.rasterize_resolution.is_finite() {
            return Err(Error::InvalidConfiguration {
                name: "rasterize_resolution",
                value: self.rasterize_resolution.to_string(),
                reason: "must be > 0".into(),
            });
        }

        if self.routing.min_slope < 0.0 {
            return Err(Error::InvalidConfiguration {
                name: "routing.min_slope",
                value: self.routing.min_slope.to_string(),
                reason: "must be >= 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.routing.max_unresolved) {
            return Err(Error::InvalidConfiguration {
                name: "routing.max_unresolved",
                value: self.routing.max_unresolved.to_string(),
                reason: "must be within [0, 1]".into(),
            });
        }

        if self.slope.z_factor <= 0.0 {
            return Err(Error::InvalidConfiguration {
                name: "slope.z_factor",
                value: self.slope.z_factor.to_string(),
                reason: "must be > 0".into(),
            });
        }

        if let Some(cap) = self.edtw.max_distance {
            if cap < 0.0 {
                return Err(Error::InvalidConfiguration {
                    name: "edtw.max_distance",
                    value: cap.to_string(),
                    reason: "must be >= 0".into(),
                });
            }
        }

        Ok(())
    }
}
