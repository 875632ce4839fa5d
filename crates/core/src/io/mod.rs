//! I/O for geospatial rasters and vector layers
//!
//! Rasters: GeoTIFF via GDAL when the `gdal` feature is enabled, with a
//! native `tiff`-crate fallback otherwise. Vector layers: any OGR format
//! with `gdal`; ESRI shapefiles natively.

#[cfg(feature = "gdal")]
mod gdal_io;
mod native;
mod vector;

#[cfg(feature = "gdal")]
pub use gdal_io::{
    read_geotiff, reproject_collection, reproject_raster, write_geotiff, GeoTiffOptions,
};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, write_geotiff, GeoTiffOptions};

pub use vector::{read_vector_layer, write_vector_layer};

/// Cell types the active raster writer backend can encode. Generic
/// persistence code bounds on this instead of the backend-specific
/// requirements (GDAL additionally needs `GdalType`).
#[cfg(feature = "gdal")]
pub trait WritableElement: crate::raster::RasterElement + gdal::raster::GdalType {}

#[cfg(feature = "gdal")]
impl<T: crate::raster::RasterElement + gdal::raster::GdalType> WritableElement for T {}

#[cfg(not(feature = "gdal"))]
pub trait WritableElement: crate::raster::RasterElement {}

#[cfg(not(feature = "gdal"))]
impl<T: crate::raster::RasterElement> WritableElement for T {}
