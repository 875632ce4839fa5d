//! Site pipeline orchestration
//!
//! Runs the full chain for one site: mosaic, water acquisition,
//! rasterization, stream burning, feature derivation. This is the only
//! module that touches the output directory tree; every processing stage
//! below it works on in-memory grids.

use crate::config::ProcessingConfig;
use crate::features::derive_features;
use crate::mosaic::load_and_mosaic;
use crate::rasterize::rasterize_water;
use crate::condition::burn_streams;
use crate::water::WaterFeatureSource;
use hydrotopo_core::io::{read_vector_layer, write_geotiff, write_vector_layer};
use hydrotopo_core::{Crs, Error, Raster};
use hydrotopo_routing::D8Router;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// On-disk layout for one site's products.
///
/// ```text
/// <root>/<site_id>/
///   raw/raw_dem.tif
///   interim/osm_water_vector.gpkg
///   interim/osm_water_raster.tif
///   processed/burned_dem.tif
///   processed/hand.tif
///   processed/slope.tif
///   processed/edtw.tif
/// ```
#[derive(Debug, Clone)]
pub struct SiteLayout {
    site_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(output_root: &Path, site_id: &str) -> Self {
        Self {
            site_dir: output_root.join(site_id),
        }
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    pub fn raw_dem(&self) -> PathBuf {
        self.site_dir.join("raw").join("raw_dem.tif")
    }

    pub fn water_vector(&self) -> PathBuf {
        self.site_dir.join("interim").join("osm_water_vector.gpkg")
    }

    pub fn water_raster(&self) -> PathBuf {
        self.site_dir.join("interim").join("osm_water_raster.tif")
    }

    pub fn burned_dem(&self) -> PathBuf {
        self.site_dir.join("processed").join("burned_dem.tif")
    }

    pub fn hand(&self) -> PathBuf {
        self.site_dir.join("processed").join("hand.tif")
    }

    pub fn slope(&self) -> PathBuf {
        self.site_dir.join("processed").join("slope.tif")
    }

    pub fn edtw(&self) -> PathBuf {
        self.site_dir.join("processed").join("edtw.tif")
    }

    /// Create the raw/interim/processed directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.site_dir.join("raw"))?;
        std::fs::create_dir_all(self.site_dir.join("interim"))?;
        std::fs::create_dir_all(self.site_dir.join("processed"))?;
        Ok(())
    }
}

/// A pipeline failure carrying the products that were already written.
///
/// Partial outputs stay on disk so a rerun can be diagnosed against them.
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed after {} product(s): {source}", partial_outputs.len())]
pub struct PipelineError {
    #[source]
    pub source: Error,
    /// Product name to path, for everything persisted before the failure
    pub partial_outputs: BTreeMap<String, PathBuf>,
}

/// Run the full pipeline for one site.
///
/// Returns a map from product name (`raw_dem`, `osm_water_vector`,
/// `osm_water_raster`, `burned_dem`, `hand`, `slope`, `edtw`) to the written
/// path. On failure the error carries whatever products were completed.
pub fn run_site(
    site_id: &str,
    aoi_path: &Path,
    dem_tile_dir: &Path,
    output_root: &Path,
    water_source: &dyn WaterFeatureSource,
    config: &ProcessingConfig,
) -> std::result::Result<BTreeMap<String, PathBuf>, PipelineError> {
    let mut outputs = BTreeMap::new();

    match run_site_inner(
        site_id,
        aoi_path,
        dem_tile_dir,
        output_root,
        water_source,
        config,
        &mut outputs,
    ) {
        Ok(()) => Ok(outputs),
        Err(source) => Err(PipelineError {
            source,
            partial_outputs: outputs,
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_site_inner(
    site_id: &str,
    aoi_path: &Path,
    dem_tile_dir: &Path,
    output_root: &Path,
    water_source: &dyn WaterFeatureSource,
    config: &ProcessingConfig,
    outputs: &mut BTreeMap<String, PathBuf>,
) -> hydrotopo_core::Result<()> {
    config.validate()?;

    info!(site_id, "starting site pipeline");

    let layout = SiteLayout::new(output_root, site_id);
    layout.ensure_dirs()?;

    let default_crs = Crs::from_epsg(config.default_epsg);

    // Stage 1: mosaic DEM tiles over the AOI
    let mut aoi = read_vector_layer(aoi_path)?;
    if aoi.crs.is_none() {
        aoi.crs = Some(default_crs.clone());
    }

    let tile_paths = collect_tile_paths(dem_tile_dir)?;
    info!(tiles = tile_paths.len(), "mosaicking DEM tiles");

    let mut dem = load_and_mosaic(&tile_paths, &aoi, config)?;
    if dem.crs().is_none() {
        dem.set_crs(Some(default_crs.clone()));
    }

    persist_raster(&dem, layout.raw_dem(), "raw_dem", outputs)?;

    // Stage 2: acquire and rasterize water features
    let dem_crs = dem.crs().cloned().unwrap_or(default_crs);
    let mut water = water_source.fetch(dem.bounds(), &dem_crs)?;
    water.retain_areal_and_linear();
    info!(features = water.len(), "water features acquired");

    match write_vector_layer(&water, layout.water_vector()) {
        Ok(()) => {
            outputs.insert("osm_water_vector".into(), layout.water_vector());
        }
        Err(Error::UnsupportedDataType(reason)) => {
            warn!(reason = %reason, "skipping water vector persistence");
        }
        Err(e) => return Err(e),
    }

    let mask = rasterize_water(&water, &dem)?;
    persist_raster(&mask, layout.water_raster(), "osm_water_raster", outputs)?;

    // Stage 3: condition the DEM
    let burned = burn_streams(&dem, &mask, config.burn_depth)?;
    persist_raster(&burned, layout.burned_dem(), "burned_dem", outputs)?;

    // Stage 4: derive features
    let features = derive_features(&burned, &mask, &D8Router, config)?;

    persist_raster(&features.hand, layout.hand(), "hand", outputs)?;
    persist_raster(&features.slope, layout.slope(), "slope", outputs)?;
    persist_raster(&features.edtw, layout.edtw(), "edtw", outputs)?;

    info!(site_id, products = outputs.len(), "site pipeline complete");

    Ok(())
}

fn persist_raster<T: hydrotopo_core::io::WritableElement>(
    raster: &Raster<T>,
    path: PathBuf,
    name: &str,
    outputs: &mut BTreeMap<String, PathBuf>,
) -> hydrotopo_core::Result<()> {
    write_geotiff(raster, &path, None)?;
    info!(product = name, path = %path.display(), "product written");
    outputs.insert(name.to_string(), path);
    Ok(())
}

/// GeoTIFF tiles in a directory, in name order so runs are deterministic
fn collect_tile_paths(dir: &Path) -> hydrotopo_core::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
                .unwrap_or(false)
        })
        .collect();

    paths.sort();

    if paths.is_empty() {
        return Err(Error::NoCoverage(format!(
            "no GeoTIFF tiles found in {}",
            dir.display()
        )));
    }

    Ok(paths)
}
