//! Grey-scale morphology on elevation grids
//!
//! Flat square structuring elements only. A window of size `w` covers the
//! cells within `w / 2` of the centre along each axis (odd sizes are
//! centred exactly, even sizes round up to the next odd size). Neighbourhoods
//! are clipped at the grid border.
//!
//! A square element is separable, so each operator runs as a row pass
//! followed by a column pass. Every operator reads only its input grid and
//! returns a new one.

use crate::elevation_grid::{ElevationGrid, EMPTY_CELL};
use rayon::prelude::*;

/// Per-cell minimum over the window
pub fn erode(grid: &ElevationGrid, window: usize) -> ElevationGrid {
    rank_filter(grid, window / 2, f32::min)
}

/// Per-cell maximum over the window
pub fn dilate(grid: &ElevationGrid, window: usize) -> ElevationGrid {
    rank_filter(grid, window / 2, f32::max)
}

/// Erosion followed by dilation with the same window.
///
/// Removes raised features narrower than the window and leaves broad low
/// surfaces in place.
pub fn open(grid: &ElevationGrid, window: usize) -> ElevationGrid {
    let eroded = erode(grid, window);
    dilate(&eroded, window)
}

fn rank_filter(grid: &ElevationGrid, half: usize, op: fn(f32, f32) -> f32) -> ElevationGrid {
    let cols = grid.cols();
    let rows = grid.rows();
    let src = grid.cells();

    if src.is_empty() || half == 0 {
        return grid.clone();
    }

    let mut along_rows = vec![EMPTY_CELL; src.len()];
    along_rows
        .par_chunks_mut(cols)
        .zip(src.par_chunks(cols))
        .for_each(|(out, row)| {
            for (c, value) in out.iter_mut().enumerate() {
                let lo = c.saturating_sub(half);
                let hi = (c + half).min(cols - 1);
                *value = row[lo..=hi].iter().copied().reduce(op).unwrap_or(EMPTY_CELL);
            }
        });

    let mut result = vec![EMPTY_CELL; src.len()];
    result
        .par_chunks_mut(cols)
        .enumerate()
        .for_each(|(r, out)| {
            let lo = r.saturating_sub(half);
            let hi = (r + half).min(rows - 1);
            for (c, value) in out.iter_mut().enumerate() {
                *value = (lo..=hi)
                    .map(|rr| along_rows[rr * cols + c])
                    .reduce(op)
                    .unwrap_or(EMPTY_CELL);
            }
        });

    grid.with_cells(result)
}
