//! GeoTIFF reading/writing and reprojection using GDAL

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use crate::vector::{Feature, FeatureCollection};
use gdal::raster::GdalType;
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use std::path::Path;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone)]
pub struct GeoTiffOptions {
    /// Compression type: "DEFLATE", "LZW", "ZSTD", "NONE"
    pub compression: String,
    /// Tile size for tiled TIFFs (0 for strips)
    pub tile_size: usize,
    /// BigTIFF for files > 4GB
    pub bigtiff: bool,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: "DEFLATE".to_string(),
            tile_size: 256,
            bigtiff: false,
        }
    }
}

/// Read a GeoTIFF file into a Raster
///
/// # Arguments
/// * `path` - Path to the GeoTIFF file
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    read_band(&dataset, band.unwrap_or(1))
}

fn read_band<T>(dataset: &Dataset, band_idx: usize) -> Result<Raster<T>>
where
    T: RasterElement + GdalType,
{
    let rasterband = dataset.rasterband(band_idx)?;
    let (cols, rows) = dataset.raster_size();

    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;
    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        raster.set_crs(Some(spatial_ref_to_crs(&srs)));
    }

    if let Ok(nodata) = rasterband.no_data_value() {
        if let Some(nd) = num_traits::cast(nodata) {
            raster.set_nodata(Some(nd));
        }
    }

    Ok(raster)
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement + GdalType,
    P: AsRef<Path>,
{
    let opts = options.unwrap_or_default();
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let (rows, cols) = raster.shape();

    let mut create_options = vec![format!("COMPRESS={}", opts.compression)];

    if opts.tile_size > 0 {
        create_options.push("TILED=YES".to_string());
        create_options.push(format!("BLOCKXSIZE={}", opts.tile_size));
        create_options.push(format!("BLOCKYSIZE={}", opts.tile_size));
    }

    if opts.bigtiff {
        create_options.push("BIGTIFF=YES".to_string());
    }

    let create_options_refs: Vec<&str> = create_options.iter().map(|s| s.as_str()).collect();

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path.as_ref(),
        cols as isize,
        rows as isize,
        1,
        &create_options_refs,
    )?;

    dataset.set_geo_transform(&raster.transform().to_gdal())?;

    if let Some(crs) = raster.crs() {
        let srs = crs_to_spatial_ref(crs)?;
        dataset.set_spatial_ref(&srs)?;
    }

    let mut band = dataset.rasterband(1)?;

    if let Some(nodata) = raster.nodata() {
        if let Some(nd) = num_traits::cast(nodata) {
            band.set_no_data_value(Some(nd))?;
        }
    }

    let data: Vec<T> = raster.data().iter().copied().collect();
    band.write((0, 0), (cols, rows), &data)?;

    Ok(())
}

/// Reproject a raster to a target CRS.
///
/// The output keeps the source pixel count; its transform spans the
/// reprojected bounding box. Cells with no source coverage get the
/// source nodata value (or NaN when none is set).
pub fn reproject_raster(src: &Raster<f64>, target: &Crs) -> Result<Raster<f64>> {
    let src_crs = src
        .crs()
        .ok_or_else(|| Error::GridMismatch("source raster has no CRS".into()))?;

    let src_sr = crs_to_spatial_ref(src_crs)?;
    let dst_sr = crs_to_spatial_ref(target)?;

    let (rows, cols) = src.shape();

    // Transform the four corners to find the destination extent
    let (min_x, min_y, max_x, max_y) = src.bounds();
    let mut xs = [min_x, max_x, min_x, max_x];
    let mut ys = [min_y, min_y, max_y, max_y];
    let mut zs = [0.0; 4];

    let transform = CoordTransform::new(&src_sr, &dst_sr)?;
    transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

    let dst_min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let dst_max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let dst_min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
    let dst_max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let dst_transform = GeoTransform::new(
        dst_min_x,
        dst_max_y,
        (dst_max_x - dst_min_x) / cols as f64,
        -((dst_max_y - dst_min_y) / rows as f64),
    );

    let nodata = src.nodata().unwrap_or(f64::NAN);

    // Source and destination live in in-memory datasets for the warp
    let mem = DriverManager::get_driver_by_name("MEM")?;

    let mut src_ds = mem.create_with_band_type::<f64, _>("", cols as isize, rows as isize, 1)?;
    src_ds.set_geo_transform(&src.transform().to_gdal())?;
    src_ds.set_spatial_ref(&src_sr)?;
    {
        let mut band = src_ds.rasterband(1)?;
        band.set_no_data_value(Some(nodata))?;
        let data: Vec<f64> = src.data().iter().copied().collect();
        band.write((0, 0), (cols, rows), &data)?;
    }

    let mut dst_ds = mem.create_with_band_type::<f64, _>("", cols as isize, rows as isize, 1)?;
    dst_ds.set_geo_transform(&dst_transform.to_gdal())?;
    dst_ds.set_spatial_ref(&dst_sr)?;
    {
        let mut band = dst_ds.rasterband(1)?;
        band.set_no_data_value(Some(nodata))?;
        band.fill(nodata, None)?;
    }

    gdal::raster::reproject(&src_ds, &dst_ds)?;

    let mut out: Raster<f64> = read_band(&dst_ds, 1)?;
    out.set_crs(Some(target.clone()));
    out.set_nodata(Some(nodata));
    Ok(out)
}

/// Reproject every geometry of a collection to a target CRS
pub fn reproject_collection(fc: &FeatureCollection, target: &Crs) -> Result<FeatureCollection> {
    let src_crs = fc
        .crs
        .as_ref()
        .ok_or_else(|| Error::GridMismatch("vector layer has no CRS".into()))?;

    if src_crs.is_equivalent(target) {
        return Ok(fc.clone());
    }

    let src_sr = crs_to_spatial_ref(src_crs)?;
    let dst_sr = crs_to_spatial_ref(target)?;
    let transform = CoordTransform::new(&src_sr, &dst_sr)?;

    let tx = |c: Coord<f64>| -> Result<Coord<f64>> {
        let mut xs = [c.x];
        let mut ys = [c.y];
        let mut zs = [0.0];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
        Ok(Coord { x: xs[0], y: ys[0] })
    };

    let mut out = FeatureCollection::empty_with_crs(target.clone());
    for feature in fc.iter() {
        let geometry = map_geometry(&feature.geometry, &tx)?;
        let mut f = Feature::new(geometry);
        f.properties = feature.properties.clone();
        out.push(f);
    }
    Ok(out)
}

fn map_line_string<F>(ls: &LineString<f64>, tx: &F) -> Result<LineString<f64>>
where
    F: Fn(Coord<f64>) -> Result<Coord<f64>>,
{
    let coords: Result<Vec<Coord<f64>>> = ls.coords().map(|&c| tx(c)).collect();
    Ok(LineString::new(coords?))
}

fn map_polygon<F>(poly: &Polygon<f64>, tx: &F) -> Result<Polygon<f64>>
where
    F: Fn(Coord<f64>) -> Result<Coord<f64>>,
{
    let exterior = map_line_string(poly.exterior(), tx)?;
    let interiors: Result<Vec<LineString<f64>>> = poly
        .interiors()
        .iter()
        .map(|ring| map_line_string(ring, tx))
        .collect();
    Ok(Polygon::new(exterior, interiors?))
}

fn map_geometry<F>(geometry: &Geometry<f64>, tx: &F) -> Result<Geometry<f64>>
where
    F: Fn(Coord<f64>) -> Result<Coord<f64>>,
{
    Ok(match geometry {
        Geometry::Point(p) => Geometry::Point(Point(tx(p.0)?)),
        Geometry::LineString(ls) => Geometry::LineString(map_line_string(ls, tx)?),
        Geometry::MultiLineString(mls) => {
            let lines: Result<Vec<LineString<f64>>> =
                mls.iter().map(|ls| map_line_string(ls, tx)).collect();
            Geometry::MultiLineString(MultiLineString::new(lines?))
        }
        Geometry::Polygon(poly) => Geometry::Polygon(map_polygon(poly, tx)?),
        Geometry::MultiPolygon(mp) => {
            let polys: Result<Vec<Polygon<f64>>> =
                mp.iter().map(|poly| map_polygon(poly, tx)).collect();
            Geometry::MultiPolygon(MultiPolygon::new(polys?))
        }
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "cannot reproject geometry type {other:?}"
            )))
        }
    })
}

/// Build a GDAL SpatialRef from a Crs
pub(crate) fn crs_to_spatial_ref(crs: &Crs) -> Result<SpatialRef> {
    if let Some(epsg) = crs.epsg() {
        return Ok(SpatialRef::from_epsg(epsg)?);
    }
    if let Some(wkt) = crs.wkt() {
        return Ok(SpatialRef::from_wkt(wkt)?);
    }
    Err(Error::GridMismatch("CRS has neither EPSG nor WKT".into()))
}

/// Build a Crs from a GDAL SpatialRef, preferring the EPSG code
pub(crate) fn spatial_ref_to_crs(srs: &SpatialRef) -> Crs {
    if let Ok(code) = srs.auth_code() {
        return Crs::from_epsg(code as u32);
    }
    match srs.to_wkt() {
        Ok(wkt) => Crs::from_wkt(wkt),
        Err(_) => Crs::default(),
    }
}
