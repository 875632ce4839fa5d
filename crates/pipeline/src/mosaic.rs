//! Elevation tile mosaicking
//!
//! Merges a set of DEM tiles into one seamless grid clipped to an area
//! of interest. Tiles are pasted onto the lattice of the first tile;
//! where coverage overlaps, the first valid value wins and later tiles
//! never overwrite it.

use crate::config::{ElevationUnit, ProcessingConfig};
use hydrotopo_core::io::read_geotiff;
use hydrotopo_core::{Error, FeatureCollection, GeoTransform, Raster, Result};
use std::path::PathBuf;
use tracing::{debug, warn};

const RESOLUTION_EPSILON: f64 = 1e-6;

/// Read DEM tiles from disk and mosaic them over the AOI.
pub fn load_and_mosaic(
    tile_paths: &[PathBuf],
    aoi: &FeatureCollection,
    config: &ProcessingConfig,
) -> Result<Raster<f64>> {
    if tile_paths.is_empty() {
        return Err(Error::NoCoverage("no elevation tiles provided".into()));
    }

    let mut tiles = Vec::with_capacity(tile_paths.len());
    for path in tile_paths {
        debug!(path = %path.display(), "reading DEM tile");
        let mut tile: Raster<f64> = read_geotiff(path, None)?;
        if tile.nodata().is_none() {
            tile.set_nodata(Some(config.nodata));
        }
        tiles.push(tile);
    }

    mosaic_tiles(tiles, aoi, config)
}

/// Mosaic already-loaded DEM tiles over the AOI.
///
/// The output grid is snapped to the first tile's cell lattice and
/// clipped to the intersection of the AOI bounding box with the union
/// of tile extents. Cells covered by no tile carry the configured
/// nodata sentinel.
///
/// Fails with `NoCoverage` when no tile intersects the AOI and with
/// `GridMismatch` when tiles disagree on resolution (or on CRS, when
/// reprojection is unavailable).
pub fn mosaic_tiles(
    tiles: Vec<Raster<f64>>,
    aoi: &FeatureCollection,
    config: &ProcessingConfig,
) -> Result<Raster<f64>> {
    if tiles.is_empty() {
        return Err(Error::NoCoverage("no elevation tiles provided".into()));
    }

    let tiles = align_tiles(tiles, config)?;

    let reference = &tiles[0];
    let ref_transform = *reference.transform();
    let ref_crs = reference.crs().cloned();

    let aoi_bounds = resolve_aoi_bounds(aoi, ref_crs.as_ref())?;

    // Tiles whose extent intersects the AOI box participate; the rest
    // are dropped up front.
    let covering: Vec<&Raster<f64>> = tiles
        .iter()
        .filter(|t| boxes_intersect(t.bounds(), aoi_bounds))
        .collect();

    if covering.is_empty() {
        return Err(Error::NoCoverage(format!(
            "no tile intersects the AOI bounds ({:.3}, {:.3}, {:.3}, {:.3})",
            aoi_bounds.0, aoi_bounds.1, aoi_bounds.2, aoi_bounds.3
        )));
    }

    let coverage = covering
        .iter()
        .map(|t| t.bounds())
        .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
        .unwrap_or(aoi_bounds);

    let clip = (
        aoi_bounds.0.max(coverage.0),
        aoi_bounds.1.max(coverage.1),
        aoi_bounds.2.min(coverage.2),
        aoi_bounds.3.min(coverage.3),
    );

    let (transform, rows, cols) = snap_to_lattice(&ref_transform, clip);
    if rows == 0 || cols == 0 {
        return Err(Error::NoCoverage(
            "AOI intersection with tile coverage is empty".into(),
        ));
    }

    let mut output = Raster::filled(rows, cols, config.nodata);
    output.set_transform(transform);
    output.set_crs(ref_crs);
    output.set_nodata(Some(config.nodata));

    let mut overlap_cells: usize = 0;

    for tile in &covering {
        paste_tile(&mut output, tile, &mut overlap_cells);
    }

    if overlap_cells > 0 {
        warn!(
            overlap_cells,
            "tiles overlap; kept the first valid value in each overlapping cell"
        );
    }

    if config.elevation_unit == ElevationUnit::Centimeters {
        let nodata = config.nodata;
        output.data_mut().mapv_inplace(|v| {
            if v == nodata || v.is_nan() {
                v
            } else {
                v / 100.0
            }
        });
    }

    let stats = output.statistics();
    if stats.valid_count == 0 {
        return Err(Error::NoCoverage(
            "mosaic contains no valid elevation cells".into(),
        ));
    }

    debug!(
        rows,
        cols,
        valid = stats.valid_count,
        nodata = stats.nodata_count,
        "mosaic assembled"
    );

    Ok(output)
}

/// Bring every tile onto the first tile's resolution and CRS.
fn align_tiles(tiles: Vec<Raster<f64>>, config: &ProcessingConfig) -> Result<Vec<Raster<f64>>> {
    let ref_transform = *tiles[0].transform();
    let ref_crs = tiles[0].crs().cloned();

    let mut aligned = Vec::with_capacity(tiles.len());

    for (idx, tile) in tiles.into_iter().enumerate() {
        let tile = match (tile.crs(), ref_crs.as_ref()) {
            (Some(crs), Some(reference)) if !crs.is_equivalent(reference) => {
                reproject_tile(tile, reference, config, idx)?
            }
            _ => tile,
        };

        let gt = tile.transform();
        if (gt.pixel_width - ref_transform.pixel_width).abs() > RESOLUTION_EPSILON
            || (gt.pixel_height - ref_transform.pixel_height).abs() > RESOLUTION_EPSILON
        {
            return Err(Error::GridMismatch(format!(
                "tile {idx} resolution ({}, {}) does not match the reference ({}, {})",
                gt.pixel_width, gt.pixel_height, ref_transform.pixel_width, ref_transform.pixel_height
            )));
        }

        aligned.push(tile);
    }

    Ok(aligned)
}

#[cfg(feature = "gdal")]
fn reproject_tile(
    tile: Raster<f64>,
    target: &hydrotopo_core::Crs,
    _config: &ProcessingConfig,
    idx: usize,
) -> Result<Raster<f64>> {
    debug!(tile = idx, target = %target, "reprojecting tile to the reference CRS");
    hydrotopo_core::io::reproject_raster(&tile, target)
}

#[cfg(not(feature = "gdal"))]
fn reproject_tile(
    tile: Raster<f64>,
    target: &hydrotopo_core::Crs,
    _config: &ProcessingConfig,
    idx: usize,
) -> Result<Raster<f64>> {
    let _ = tile;
    Err(Error::GridMismatch(format!(
        "tile {idx} is in a different CRS than {target}; reprojection requires the gdal feature"
    )))
}

/// AOI bounds in the reference CRS.
fn resolve_aoi_bounds(
    aoi: &FeatureCollection,
    ref_crs: Option<&hydrotopo_core::Crs>,
) -> Result<(f64, f64, f64, f64)> {
    let needs_reprojection = matches!(
        (aoi.crs.as_ref(), ref_crs),
        (Some(a), Some(b)) if !a.is_equivalent(b)
    );

    if !needs_reprojection {
        return aoi
            .bounds()
            .ok_or_else(|| Error::NoCoverage("AOI layer contains no geometry".into()));
    }

    #[cfg(feature = "gdal")]
    {
        let target = ref_crs.cloned().unwrap_or_default();
        let reprojected = hydrotopo_core::io::reproject_collection(aoi, &target)?;
        reprojected
            .bounds()
            .ok_or_else(|| Error::NoCoverage("AOI layer contains no geometry".into()))
    }

    #[cfg(not(feature = "gdal"))]
    {
        Err(Error::GridMismatch(
            "AOI CRS differs from the tile CRS; reprojection requires the gdal feature".into(),
        ))
    }
}

/// Snap a clip box outward to the reference cell lattice.
///
/// Returns the output transform plus grid dimensions. The origin lands
/// on a lattice point of the reference transform so tile cells map to
/// integer offsets in the output.
fn snap_to_lattice(
    reference: &GeoTransform,
    clip: (f64, f64, f64, f64),
) -> (GeoTransform, usize, usize) {
    let (min_x, min_y, max_x, max_y) = clip;
    let pw = reference.pixel_width;
    let ph = reference.pixel_height.abs();

    let col0 = ((min_x - reference.origin_x) / pw).floor();
    let row0 = ((reference.origin_y - max_y) / ph).floor();

    let origin_x = reference.origin_x + col0 * pw;
    let origin_y = reference.origin_y - row0 * ph;

    let cols = ((max_x - origin_x) / pw).ceil().max(0.0) as usize;
    let rows = ((origin_y - min_y) / ph).ceil().max(0.0) as usize;

    (
        GeoTransform::new(origin_x, origin_y, pw, -ph),
        rows,
        cols,
    )
}

/// Copy a tile's valid cells into the mosaic, first value wins.
fn paste_tile(output: &mut Raster<f64>, tile: &Raster<f64>, overlap_cells: &mut usize) {
    let (out_rows, out_cols) = output.shape();
    let (tile_rows, tile_cols) = tile.shape();

    let out_gt = *output.transform();
    let tile_gt = tile.transform();

    // Integer cell offset of the tile origin within the output lattice
    let d_col = ((tile_gt.origin_x - out_gt.origin_x) / out_gt.pixel_width).round() as isize;
    let d_row = ((out_gt.origin_y - tile_gt.origin_y) / out_gt.pixel_height.abs()).round() as isize;

    let out_nodata = output.nodata().unwrap_or(f64::NAN);

    for row in 0..tile_rows {
        let out_row = row as isize + d_row;
        if out_row < 0 || out_row as usize >= out_rows {
            continue;
        }

        for col in 0..tile_cols {
            let out_col = col as isize + d_col;
            if out_col < 0 || out_col as usize >= out_cols {
                continue;
            }

            let value = unsafe { tile.get_unchecked(row, col) };
            if tile.is_nodata(value) {
                continue;
            }

            let (or, oc) = (out_row as usize, out_col as usize);
            let existing = unsafe { output.get_unchecked(or, oc) };
            if existing == out_nodata || existing.is_nan() {
                unsafe { output.set_unchecked(or, oc, value) };
            } else {
                *overlap_cells += 1;
            }
        }
    }
}

fn boxes_intersect(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64)) -> bool {
    a.0 <= b.2 && b.0 <= a.2 && a.1 <= b.3 && b.1 <= a.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, Geometry};
    use hydrotopo_core::Feature;

    fn tile(origin_x: f64, origin_y: f64, rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut t = Raster::filled(rows, cols, value);
        t.set_transform(GeoTransform::new(origin_x, origin_y, 1.0, -1.0));
        t.set_nodata(Some(-9999.0));
        t
    }

    fn aoi(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> FeatureCollection {
        let mut fc = FeatureCollection::new();
        fc.push(Feature::new(Geometry::Polygon(polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ])));
        fc
    }

    #[test]
    fn test_two_by_two_tile_grid() {
        // Four 2x2 tiles forming a 4x4 area
        let tiles = vec![
            tile(0.0, 4.0, 2, 2, 10.0),
            tile(2.0, 4.0, 2, 2, 20.0),
            tile(0.0, 2.0, 2, 2, 30.0),
            tile(2.0, 2.0, 2, 2, 40.0),
        ];

        let merged = mosaic_tiles(tiles, &aoi(0.0, 0.0, 4.0, 4.0), &ProcessingConfig::default())
            .unwrap();

        assert_eq!(merged.shape(), (4, 4));
        assert_eq!(merged.get(0, 0).unwrap(), 10.0);
        assert_eq!(merged.get(0, 3).unwrap(), 20.0);
        assert_eq!(merged.get(3, 0).unwrap(), 30.0);
        assert_eq!(merged.get(3, 3).unwrap(), 40.0);
    }

    #[test]
    fn test_order_independent_when_disjoint() {
        let a = || tile(0.0, 2.0, 2, 2, 1.0);
        let b = || tile(2.0, 2.0, 2, 2, 2.0);
        let config = ProcessingConfig::default();
        let box_ = aoi(0.0, 0.0, 4.0, 2.0);

        let ab = mosaic_tiles(vec![a(), b()], &box_, &config).unwrap();
        let ba = mosaic_tiles(vec![b(), a()], &box_, &config).unwrap();

        assert_eq!(ab.shape(), ba.shape());
        for row in 0..2 {
            for col in 0..4 {
                assert_eq!(ab.get(row, col).unwrap(), ba.get(row, col).unwrap());
            }
        }
    }

    #[test]
    fn test_first_valid_wins_on_overlap() {
        // Second tile fully overlaps the first with different values
        let first = tile(0.0, 2.0, 2, 2, 5.0);
        let second = tile(0.0, 2.0, 2, 2, 99.0);

        let merged = mosaic_tiles(
            vec![first, second],
            &aoi(0.0, 0.0, 2.0, 2.0),
            &ProcessingConfig::default(),
        )
        .unwrap();

        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(merged.get(row, col).unwrap(), 5.0);
            }
        }
    }

    #[test]
    fn test_nodata_in_first_tile_filled_by_second() {
        let mut first = tile(0.0, 2.0, 2, 2, 5.0);
        first.set(0, 0, -9999.0).unwrap();
        let second = tile(0.0, 2.0, 2, 2, 99.0);

        let merged = mosaic_tiles(
            vec![first, second],
            &aoi(0.0, 0.0, 2.0, 2.0),
            &ProcessingConfig::default(),
        )
        .unwrap();

        assert_eq!(merged.get(0, 0).unwrap(), 99.0);
        assert_eq!(merged.get(1, 1).unwrap(), 5.0);
    }

    #[test]
    fn test_disjoint_aoi_is_no_coverage() {
        let tiles = vec![tile(0.0, 2.0, 2, 2, 1.0)];
        let result = mosaic_tiles(tiles, &aoi(100.0, 100.0, 110.0, 110.0), &ProcessingConfig::default());
        assert!(matches!(result, Err(Error::NoCoverage(_))));
    }

    #[test]
    fn test_empty_tile_list_is_no_coverage() {
        let result = mosaic_tiles(
            Vec::new(),
            &aoi(0.0, 0.0, 1.0, 1.0),
            &ProcessingConfig::default(),
        );
        assert!(matches!(result, Err(Error::NoCoverage(_))));
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let coarse = {
            let mut t = Raster::filled(2, 2, 1.0);
            t.set_transform(GeoTransform::new(0.0, 4.0, 2.0, -2.0));
            t
        };
        let fine = tile(0.0, 2.0, 2, 2, 1.0);

        let result = mosaic_tiles(
            vec![fine, coarse],
            &aoi(0.0, 0.0, 4.0, 4.0),
            &ProcessingConfig::default(),
        );
        assert!(matches!(result, Err(Error::GridMismatch(_))));
    }

    #[test]
    fn test_aoi_clips_mosaic() {
        // Single 4x4 tile, AOI covers only the NW 2x2 corner
        let tiles = vec![tile(0.0, 4.0, 4, 4, 7.0)];
        let merged = mosaic_tiles(tiles, &aoi(0.0, 2.0, 2.0, 4.0), &ProcessingConfig::default())
            .unwrap();

        assert_eq!(merged.shape(), (2, 2));
        assert_eq!(merged.transform().origin_x, 0.0);
        assert_eq!(merged.transform().origin_y, 4.0);
    }

    #[test]
    fn test_centimeter_conversion() {
        let tiles = vec![tile(0.0, 2.0, 2, 2, 1250.0)];
        let config = ProcessingConfig {
            elevation_unit: ElevationUnit::Centimeters,
            ..Default::default()
        };

        let merged = mosaic_tiles(tiles, &aoi(0.0, 0.0, 2.0, 2.0), &config).unwrap();
        assert_eq!(merged.get(0, 0).unwrap(), 12.5);
    }
}
