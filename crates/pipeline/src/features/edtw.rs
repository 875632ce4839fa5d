//! Euclidean distance to water
//!
//! Exact squared distance transform (Felzenszwalb & Huttenlocher 2012)
//! over the water mask, scaled by cell size into map units. Water cells
//! are exactly 0; an empty mask has no defined distances and yields an
//! all-NaN grid.

use hydrotopo_core::{Raster, Result};
use ndarray::Array2;
use tracing::warn;

/// Compute Euclidean distance to the nearest water cell, in map units.
///
/// `max_distance` truncates (not masks) distances beyond the cap.
pub fn distance_to_water(mask: &Raster<u8>, max_distance: Option<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = mask.shape();
    let cell_size = mask.cell_size();

    let mut output = mask.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));

    let water_cells = mask.data().iter().filter(|&&v| v == 1).count();
    if water_cells == 0 {
        warn!("water mask is empty; distance to water is undefined everywhere");
        output.data_mut().fill(f64::NAN);
        return Ok(output);
    }

    // Squared distances in cell units; 0 at water, "infinite" elsewhere
    let mut sq = Array2::from_elem((rows, cols), f64::INFINITY);
    for ((row, col), &v) in mask.data().indexed_iter() {
        if v == 1 {
            sq[(row, col)] = 0.0;
        }
    }

    // Two separable 1D passes: down the columns, then along the rows
    let mut line = vec![0.0; rows.max(cols)];

    for col in 0..cols {
        for row in 0..rows {
            line[row] = sq[(row, col)];
        }
        let transformed = transform_1d(&line[..rows]);
        for row in 0..rows {
            sq[(row, col)] = transformed[row];
        }
    }

    for row in 0..rows {
        for col in 0..cols {
            line[col] = sq[(row, col)];
        }
        let transformed = transform_1d(&line[..cols]);
        for col in 0..cols {
            sq[(row, col)] = transformed[col];
        }
    }

    for ((row, col), &d2) in sq.indexed_iter() {
        let mut d = d2.sqrt() * cell_size;
        if let Some(cap) = max_distance {
            d = d.min(cap);
        }
        unsafe { output.set_unchecked(row, col, d) };
    }

    Ok(output)
}

/// 1D squared distance transform by lower envelope of parabolas
fn transform_1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    let mut out = vec![0.0; n];
    if n == 0 {
        return out;
    }

    // v: parabola apex indices, z: envelope boundaries
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;

    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    for q in 1..n {
        loop {
            let p = v[k];
            let s = intersect(f, p, q);
            if s <= z[k] && k > 0 {
                k -= 1;
            } else {
                k += 1;
                v[k] = q;
                z[k] = s;
                z[k + 1] = f64::INFINITY;
                break;
            }
        }
    }

    k = 0;
    for q in 0..n {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        let dq = q as f64 - p as f64;
        out[q] = dq * dq + f[p];
    }

    out
}

/// Abscissa where parabolas rooted at p and q intersect
fn intersect(f: &[f64], p: usize, q: usize) -> f64 {
    let (pf, qf) = (p as f64, q as f64);

    if f[p].is_infinite() && f[q].is_infinite() {
        return f64::NEG_INFINITY;
    }
    if f[p].is_infinite() {
        return f64::NEG_INFINITY;
    }
    if f[q].is_infinite() {
        return f64::INFINITY;
    }

    ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
}
