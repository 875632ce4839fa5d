//! # hydrotopo Core
//!
//! Core types and I/O for the hydrotopo terrain-feature pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid type used for elevation surfaces,
//!   water masks and derived feature grids
//! - `GeoTransform`: affine pixel/geographic mapping
//! - `Crs`: coordinate reference system handling
//! - `coregister`: the shared shape/transform/CRS compatibility check
//! - I/O for GeoTIFF rasters and vector layers

pub mod coregister;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use coregister::ensure_coregistered;
pub use crs::Crs;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{visit_coords, AttributeValue, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::coregister::ensure_coregistered;
    pub use crate::crs::Crs;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{Feature, FeatureCollection};
}
