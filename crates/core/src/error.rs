//! Error types for hydrotopo

use thiserror::Error;

/// Main error type for hydrotopo operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape/transform/CRS incompatibility between inputs that must be
    /// co-registered (merge tiles, mask vs. grid, routing outputs).
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    #[error("no input tiles intersect the area of interest ({0})")]
    NoCoverage(String),

    /// The routing backend could not resolve flow for the given surface
    /// within its fill tolerance.
    #[error("flow routing failed: {0}")]
    Routing(String),

    #[error("invalid configuration: {name} = {value} ({reason})")]
    InvalidConfiguration {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<shapefile::Error> for Error {
    fn from(e: shapefile::Error) -> Self {
        Error::Other(format!("shapefile error: {e}"))
    }
}

/// Result type alias for hydrotopo operations
pub type Result<T> = std::result::Result<T, Error>;
