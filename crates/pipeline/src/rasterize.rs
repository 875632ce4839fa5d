//! Water feature rasterization
//!
//! Burns a water vector layer onto the DEM grid as a binary mask using
//! all-touched semantics: polygon interiors are filled by scanline over
//! cell centers, and every boundary ring and line geometry additionally
//! marks each cell its segments pass through. The mask has no nodata
//! concept; absence of water is a valid 0.

use geo_types::{Coord, Geometry, LineString, Polygon};
use hydrotopo_core::{FeatureCollection, Raster, Result};
use tracing::debug;

/// Rasterize water features onto the grid of a target raster.
///
/// The output is co-registered with `target`: same shape, transform and
/// CRS. An empty layer yields an all-zero mask.
pub fn rasterize_water(layer: &FeatureCollection, target: &Raster<f64>) -> Result<Raster<u8>> {
    let layer = align_layer(layer, target)?;

    let (rows, cols) = target.shape();
    let mut mask: Raster<u8> = target.with_same_meta(rows, cols);

    let mut burned = 0usize;
    for feature in layer.iter() {
        match &feature.geometry {
            Geometry::Polygon(poly) => burn_polygon(&mut mask, poly),
            Geometry::MultiPolygon(mp) => {
                for poly in mp.iter() {
                    burn_polygon(&mut mask, poly);
                }
            }
            Geometry::LineString(ls) => burn_linestring(&mut mask, ls),
            Geometry::MultiLineString(mls) => {
                for ls in mls.iter() {
                    burn_linestring(&mut mask, ls);
                }
            }
            // Points and collections carry no rasterizable water extent
            _ => continue,
        }
        burned += 1;
    }

    debug!(
        features = burned,
        water_cells = mask.data().iter().filter(|&&v| v == 1).count(),
        "water layer rasterized"
    );

    Ok(mask)
}

/// Reproject the layer into the target CRS when both sides declare one.
fn align_layer(layer: &FeatureCollection, target: &Raster<f64>) -> Result<FeatureCollection> {
    let needs_reprojection = matches!(
        (layer.crs.as_ref(), target.crs()),
        (Some(a), Some(b)) if !a.is_equivalent(b)
    );

    if !needs_reprojection {
        return Ok(layer.clone());
    }

    #[cfg(feature = "gdal")]
    {
        let target_crs = target.crs().cloned().unwrap_or_default();
        hydrotopo_core::io::reproject_collection(layer, &target_crs)
    }

    #[cfg(not(feature = "gdal"))]
    {
        Err(hydrotopo_core::Error::GridMismatch(
            "water layer CRS differs from the DEM CRS; reprojection requires the gdal feature"
                .into(),
        ))
    }
}

/// Fill a polygon interior by even-odd scanline over cell centers, then
/// trace its rings so boundary-touched cells are included.
fn burn_polygon(mask: &mut Raster<u8>, poly: &Polygon<f64>) {
    let (rows, _) = mask.shape();
    let gt = *mask.transform();
    let ph = gt.pixel_height;

    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for c in poly.exterior().coords() {
        min_y = min_y.min(c.y);
        max_y = max_y.max(c.y);
    }
    if !min_y.is_finite() {
        return;
    }

    // Row range covering the polygon's vertical extent
    let row_start = ((gt.origin_y - max_y) / ph.abs()).floor().max(0.0) as usize;
    let row_end = (((gt.origin_y - min_y) / ph.abs()).ceil() as usize).min(rows);

    let mut crossings: Vec<f64> = Vec::new();

    for row in row_start..row_end {
        let y = gt.origin_y + (row as f64 + 0.5) * ph;

        crossings.clear();
        collect_crossings(poly.exterior(), y, &mut crossings);
        for ring in poly.interiors() {
            collect_crossings(ring, y, &mut crossings);
        }
        crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        for pair in crossings.chunks_exact(2) {
            fill_span(mask, row, pair[0], pair[1]);
        }
    }

    burn_linestring(mask, poly.exterior());
    for ring in poly.interiors() {
        burn_linestring(mask, ring);
    }
}

/// X coordinates where a ring crosses the horizontal line at `y`
fn collect_crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    let coords = &ring.0;
    if coords.len() < 2 {
        return;
    }

    for window in coords.windows(2) {
        let (p, q) = (window[0], window[1]);
        // Half-open rule so shared vertices count once
        if (p.y > y) != (q.y > y) {
            let x = p.x + (y - p.y) * (q.x - p.x) / (q.y - p.y);
            out.push(x);
        }
    }
}

/// Mark cells whose center X lies within [x0, x1] on one row
fn fill_span(mask: &mut Raster<u8>, row: usize, x0: f64, x1: f64) {
    let gt = *mask.transform();
    let cols = mask.cols();
    let pw = gt.pixel_width;

    let col_start = ((x0 - gt.origin_x) / pw - 0.5).ceil().max(0.0) as usize;
    let col_end = ((x1 - gt.origin_x) / pw - 0.5).floor();
    if col_end < 0.0 {
        return;
    }
    let col_end = (col_end as usize).min(cols.saturating_sub(1));

    for col in col_start..=col_end {
        if col < cols {
            unsafe { mask.set_unchecked(row, col, 1) };
        }
    }
}

fn burn_linestring(mask: &mut Raster<u8>, line: &LineString<f64>) {
    for window in line.0.windows(2) {
        burn_segment(mask, window[0], window[1]);
    }
    if line.0.len() == 1 {
        burn_point(mask, line.0[0]);
    }
}

fn burn_point(mask: &mut Raster<u8>, p: Coord<f64>) {
    let (col, row) = mask.geo_to_pixel(p.x, p.y);
    mark(mask, col.floor() as isize, row.floor() as isize);
}

/// Amanatides-Woo grid traversal: marks every cell a segment passes
/// through, not just the ones containing sampled points.
fn burn_segment(mask: &mut Raster<u8>, a: Coord<f64>, b: Coord<f64>) {
    let (c0, r0) = mask.geo_to_pixel(a.x, a.y);
    let (c1, r1) = mask.geo_to_pixel(b.x, b.y);

    if !c0.is_finite() || !c1.is_finite() {
        return;
    }

    let mut cx = c0.floor() as isize;
    let mut cy = r0.floor() as isize;
    let ex = c1.floor() as isize;
    let ey = r1.floor() as isize;

    let dx = c1 - c0;
    let dy = r1 - r0;

    let step_x: isize = if dx > 0.0 { 1 } else { -1 };
    let step_y: isize = if dy > 0.0 { 1 } else { -1 };

    let t_delta_x = if dx != 0.0 { 1.0 / dx.abs() } else { f64::INFINITY };
    let t_delta_y = if dy != 0.0 { 1.0 / dy.abs() } else { f64::INFINITY };

    let mut t_max_x = if dx > 0.0 {
        ((cx + 1) as f64 - c0) / dx
    } else if dx < 0.0 {
        (c0 - cx as f64) / -dx
    } else {
        f64::INFINITY
    };
    let mut t_max_y = if dy > 0.0 {
        ((cy + 1) as f64 - r0) / dy
    } else if dy < 0.0 {
        (r0 - cy as f64) / -dy
    } else {
        f64::INFINITY
    };

    // Step budget bounds runaway traversal on degenerate inputs
    let max_steps = (ex - cx).unsigned_abs() + (ey - cy).unsigned_abs() + 1;

    mark(mask, cx, cy);
    for _ in 0..max_steps {
        if cx == ex && cy == ey {
            break;
        }
        if t_max_x < t_max_y {
            t_max_x += t_delta_x;
            cx += step_x;
        } else {
            t_max_y += t_delta_y;
            cy += step_y;
        }
        mark(mask, cx, cy);
    }
}

fn mark(mask: &mut Raster<u8>, col: isize, row: isize) {
    if row < 0 || col < 0 {
        return;
    }
    let (rows, cols) = mask.shape();
    if (row as usize) < rows && (col as usize) < cols {
        unsafe { mask.set_unchecked(row as usize, col as usize, 1) };
    }
}
