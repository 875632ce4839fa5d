//! End-to-end pipeline runs over small synthetic sites: tiled DEMs on
//! disk, an AOI shapefile, and an in-memory water source.

use approx::assert_relative_eq;
use hydrotopo_core::io::read_geotiff;
use hydrotopo_core::{Crs, Error, FeatureCollection, Feature, GeoTransform, Raster, Result};
use hydrotopo_pipeline::{run_site, ProcessingConfig, WaterFeatureSource};
use shapefile::dbase::TableWriterBuilder;
use shapefile::{Point, Polygon, PolygonRing};
use std::path::Path;

/// South-sloping 4x4 tile: 40, 30, 20, 10 by row
fn write_tile(path: &Path, origin_x: f64, origin_y: f64) {
    let mut tile: Raster<f64> = Raster::new(4, 4);
    tile.set_transform(GeoTransform::new(origin_x, origin_y, 1.0, -1.0));
    for row in 0..4 {
        for col in 0..4 {
            tile.set(row, col, (4 - row) as f64 * 10.0).unwrap();
        }
    }
    hydrotopo_core::io::write_geotiff(&tile, path, None).unwrap();
}

fn write_aoi(path: &Path, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
    let table = TableWriterBuilder::new().add_character_field("name".try_into().unwrap(), 16);
    let mut writer = shapefile::Writer::from_path(path, table).unwrap();

    let ring = PolygonRing::Outer(vec![
        Point::new(min_x, min_y),
        Point::new(max_x, min_y),
        Point::new(max_x, max_y),
        Point::new(min_x, max_y),
        Point::new(min_x, min_y),
    ]);

    let mut record = shapefile::dbase::Record::default();
    record.insert(
        "name".to_string(),
        shapefile::dbase::FieldValue::Character(Some("aoi".to_string())),
    );

    writer
        .write_shape_and_record(&Polygon::new(ring), &record)
        .unwrap();
}

/// River along the bottom of the site (y = 0.5), in memory
struct RiverSource;

impl WaterFeatureSource for RiverSource {
    fn fetch(&self, bounds: (f64, f64, f64, f64), _crs: &Crs) -> Result<FeatureCollection> {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(geo_types::Geometry::LineString(
            geo_types::LineString::from(vec![(bounds.0, 0.5), (bounds.2, 0.5)]),
        )));
        Ok(fc)
    }
}

struct FailingSource;

impl WaterFeatureSource for FailingSource {
    fn fetch(&self, _bounds: (f64, f64, f64, f64), _crs: &Crs) -> Result<FeatureCollection> {
        Err(Error::Other("water service unavailable".into()))
    }
}

#[test]
fn test_full_site_run() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();

    // Two 4x4 tiles side by side covering x 0..8, y 0..4
    write_tile(&tiles.join("tile_west.tif"), 0.0, 4.0);
    write_tile(&tiles.join("tile_east.tif"), 4.0, 4.0);

    let aoi_path = dir.path().join("aoi.shp");
    write_aoi(&aoi_path, 0.0, 0.0, 8.0, 4.0);

    let out = dir.path().join("out");
    let config = ProcessingConfig::default();

    let products = run_site("site_a", &aoi_path, &tiles, &out, &RiverSource, &config).unwrap();

    for name in [
        "raw_dem",
        "osm_water_raster",
        "burned_dem",
        "hand",
        "slope",
        "edtw",
    ] {
        let path = products.get(name).unwrap_or_else(|| panic!("missing {name}"));
        assert!(path.exists(), "{name} not written at {}", path.display());
    }

    // Mosaic spans both tiles seamlessly
    let raw: Raster<f64> = read_geotiff(products["raw_dem"].clone(), None).unwrap();
    assert_eq!(raw.shape(), (4, 8));
    assert_eq!(raw.get(0, 1).unwrap(), 40.0);
    assert_eq!(raw.get(0, 6).unwrap(), 40.0);

    // The river row is burned by the default 20 m depth
    let burned: Raster<f64> = read_geotiff(products["burned_dem"].clone(), None).unwrap();
    assert_eq!(burned.get(3, 2).unwrap(), -10.0);
    assert_eq!(burned.get(2, 2).unwrap(), 20.0);

    // HAND measures height over the burned river surface
    let hand: Raster<f64> = read_geotiff(products["hand"].clone(), None).unwrap();
    assert_relative_eq!(hand.get(0, 2).unwrap(), 50.0, epsilon = 1e-6);
    assert_eq!(hand.get(3, 2).unwrap(), 0.0);

    // Slope has no gaps, including corners
    let slope: Raster<f64> = read_geotiff(products["slope"].clone(), None).unwrap();
    for row in 0..4 {
        for col in 0..8 {
            assert!(slope.get(row, col).unwrap().is_finite());
        }
    }

    // EDTW is 0 on the river and grows to the north
    let edtw: Raster<f64> = read_geotiff(products["edtw"].clone(), None).unwrap();
    assert_eq!(edtw.get(3, 4).unwrap(), 0.0);
    assert_relative_eq!(edtw.get(0, 4).unwrap(), 3.0, epsilon = 1e-6);
}

#[test]
fn test_failure_keeps_partial_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();
    write_tile(&tiles.join("tile.tif"), 0.0, 4.0);

    let aoi_path = dir.path().join("aoi.shp");
    write_aoi(&aoi_path, 0.0, 0.0, 4.0, 4.0);

    let out = dir.path().join("out");
    let config = ProcessingConfig::default();

    let err = run_site("site_b", &aoi_path, &tiles, &out, &FailingSource, &config).unwrap_err();

    // The mosaic finished before the water stage failed
    let raw = err.partial_outputs.get("raw_dem").expect("raw_dem persisted");
    assert!(raw.exists());
    assert!(!err.partial_outputs.contains_key("hand"));
}

#[test]
fn test_disjoint_aoi_fails_before_writing_products() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();
    write_tile(&tiles.join("tile.tif"), 0.0, 4.0);

    let aoi_path = dir.path().join("aoi.shp");
    write_aoi(&aoi_path, 500.0, 500.0, 510.0, 510.0);

    let out = dir.path().join("out");
    let err = run_site(
        "site_c",
        &aoi_path,
        &tiles,
        &out,
        &RiverSource,
        &ProcessingConfig::default(),
    )
    .unwrap_err();

    assert!(matches!(err.source, Error::NoCoverage(_)));
    assert!(err.partial_outputs.is_empty());
}

#[test]
fn test_empty_water_produces_nan_distance_grid() {
    struct DrySource;
    impl WaterFeatureSource for DrySource {
        fn fetch(&self, _bounds: (f64, f64, f64, f64), _crs: &Crs) -> Result<FeatureCollection> {
            Ok(FeatureCollection::new())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();
    write_tile(&tiles.join("tile.tif"), 0.0, 4.0);

    let aoi_path = dir.path().join("aoi.shp");
    write_aoi(&aoi_path, 0.0, 0.0, 4.0, 4.0);

    let out = dir.path().join("out");
    let products = run_site(
        "site_d",
        &aoi_path,
        &tiles,
        &out,
        &DrySource,
        &ProcessingConfig::default(),
    )
    .unwrap();

    // Burning is a no-op and EDTW is undefined everywhere
    let burned: Raster<f64> = read_geotiff(products["burned_dem"].clone(), None).unwrap();
    assert_eq!(burned.get(2, 2).unwrap(), 20.0);

    let edtw: Raster<f64> = read_geotiff(products["edtw"].clone(), None).unwrap();
    assert!(edtw.get(1, 1).unwrap().is_nan());
}
