//! # hydrotopo Pipeline
//!
//! DEM conditioning and hydro-topological feature derivation: mosaics
//! elevation tiles over an area of interest, rasterizes water features
//! onto the DEM grid, burns streams into the surface, and derives the
//! HAND, slope and distance-to-water grids used as flood-model inputs.
//!
//! [`pipeline::run_site`] runs the whole chain for one site; the stage
//! modules ([`mosaic`], [`rasterize`], [`condition`], [`features`]) are
//! usable on their own for in-memory processing.

pub mod condition;
pub mod config;
pub mod features;
pub mod mosaic;
pub mod pipeline;
pub mod rasterize;
pub mod water;

pub use condition::burn_streams;
pub use config::{EdtwOptions, ElevationUnit, ProcessingConfig, SlopeOptions, SlopeUnits};
pub use features::{derive_features, distance_to_water, height_above_drainage, slope, DerivedFeatures};
pub use mosaic::{load_and_mosaic, mosaic_tiles};
pub use pipeline::{run_site, PipelineError, SiteLayout};
pub use rasterize::rasterize_water;
pub use water::{FileWaterSource, WaterFeatureSource, OSM_WATER_TAGS};
