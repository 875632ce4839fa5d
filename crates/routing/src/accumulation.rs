//! Drainage accumulation
//!
//! Counts upstream contributing cells per cell by propagating counts in
//! topological order over the D8 flow graph.

use crate::D8_OFFSETS;
use hydrotopo_core::{Raster, Result};
use ndarray::Array2;

/// Compute flow accumulation from a D8 direction grid.
///
/// Headwater cells accumulate 0; every other cell receives the count of
/// all cells upstream of it. Direction 0 (pit/flat/outlet) terminates
/// propagation without contributing further downstream.
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();

    // In-degree: how many neighbors flow into each cell
    let mut in_degree = Array2::<u32>::zeros((rows, cols));

    for row in 0..rows {
        for col in 0..cols {
            if let Some((nr, nc)) = downstream(flow_dir, row, col) {
                in_degree[(nr, nc)] += 1;
            }
        }
    }

    let mut accumulation = Array2::<f64>::zeros((rows, cols));
    let mut queue: Vec<(usize, usize)> = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if in_degree[(row, col)] == 0 {
                queue.push((row, col));
            }
        }
    }

    // Topological order: a cell is processed once all upstream cells have
    // delivered their counts.
    while let Some((row, col)) = queue.pop() {
        let Some((nr, nc)) = downstream(flow_dir, row, col) else {
            continue;
        };

        accumulation[(nr, nc)] += accumulation[(row, col)] + 1.0;

        in_degree[(nr, nc)] = in_degree[(nr, nc)].saturating_sub(1);
        if in_degree[(nr, nc)] == 0 {
            queue.push((nr, nc));
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    *output.data_mut() = accumulation;

    Ok(output)
}

/// Resolve the downstream neighbor of a cell, if it has one on the grid
fn downstream(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let dir = unsafe { flow_dir.get_unchecked(row, col) };
    if dir == 0 || dir > 8 {
        return None;
    }

    let (rows, cols) = flow_dir.shape();
    let (dr, dc) = D8_OFFSETS[(dir - 1) as usize];
    let nr = row as isize + dr;
    let nc = col as isize + dc;

    if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
        return None;
    }

    Some((nr as usize, nc as usize))
}
