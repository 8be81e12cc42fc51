//! Minimum-elevation rasters built from point sets
//!
//! An [`ElevationGrid`] stores, for each planar cell, the lowest `z` of the
//! points whose `(x, y)` fall inside it. Cells are kept in a flat row-major
//! array (`index = row * cols + col`). Cells without points hold
//! [`EMPTY_CELL`] until [`ElevationGrid::filled`] in-fills them.

use groundcrate_core::{is_finite_point, Aabb, Error, Point3f, Result};
use rayon::prelude::*;
use tracing::debug;

/// Sentinel stored in cells that received no point.
pub const EMPTY_CELL: f32 = f32::NAN;

/// Bytes held per cell while the filter runs: the working surface, the
/// eroded and opened grids, and the non-ground flags.
pub const BYTES_PER_CELL: usize = 3 * std::mem::size_of::<f32>() + std::mem::size_of::<bool>();

/// Largest number of cells accepted along one axis.
const MAX_AXIS_CELLS: f64 = u32::MAX as f64;

#[inline]
pub fn is_empty_cell(value: f32) -> bool {
    value.is_nan()
}

/// Memory needed by the filter for a `cols x rows` grid, or `None` on overflow.
pub fn required_grid_bytes(cols: usize, rows: usize) -> Option<usize> {
    cols.checked_mul(rows)?.checked_mul(BYTES_PER_CELL)
}

/// A dense 2D raster of minimum elevations
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    cols: usize,
    rows: usize,
    origin: [f64; 2],
    cell_size: f64,
    cells: Vec<f32>,
}

/// An elevation grid together with the point-to-cell table used to build it.
#[derive(Debug, Clone)]
pub struct Rasterization {
    pub grid: ElevationGrid,
    /// `point_cells[i]` is the cell of point `i`, or `None` for a point with
    /// non-finite coordinates.
    pub point_cells: Vec<Option<usize>>,
}

impl ElevationGrid {
    /// Rasterise `points` into cells of edge `cell_size`.
    ///
    /// The grid origin is the minimum `(x, y)` of the finite points and each
    /// axis has `ceil(extent / cell_size) + 1` cells, so a zero extent still
    /// yields one cell. Returns `Ok(None)` when no point is finite.
    ///
    /// Fails with [`Error::ResourceExhausted`] before allocating when the grid
    /// would need more than `max_bytes` (see [`required_grid_bytes`]).
    pub fn from_points(
        points: &[Point3f],
        cell_size: f32,
        max_bytes: usize,
    ) -> Result<Option<Rasterization>> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "cell size must be positive and finite, got {}",
                cell_size
            )));
        }

        let Some(bounds) = Aabb::from_points(points.iter()) else {
            return Ok(None);
        };

        if bounds.is_planar_degenerate() {
            debug!(
                extent_x = bounds.extent().x,
                extent_y = bounds.extent().y,
                "degenerate planar extent, collapsing axis to a single cell"
            );
        }

        let cs = cell_size as f64;
        let cols = axis_cells(bounds.min.x, bounds.max.x, cs)?;
        let rows = axis_cells(bounds.min.y, bounds.max.y, cs)?;

        match required_grid_bytes(cols, rows) {
            Some(bytes) if bytes <= max_bytes => {}
            bytes => {
                return Err(Error::ResourceExhausted {
                    cols,
                    rows,
                    required_bytes: bytes.unwrap_or(usize::MAX),
                    limit_bytes: max_bytes,
                })
            }
        }

        let origin = [bounds.min.x as f64, bounds.min.y as f64];

        let point_cells: Vec<Option<usize>> = points
            .par_iter()
            .map(|p| {
                if !is_finite_point(p) {
                    return None;
                }
                let col = (((p.x as f64 - origin[0]) / cs).floor() as usize).min(cols - 1);
                let row = (((p.y as f64 - origin[1]) / cs).floor() as usize).min(rows - 1);
                Some(row * cols + col)
            })
            .collect();

        let mut cells = vec![EMPTY_CELL; cols * rows];
        for (p, cell) in points.iter().zip(&point_cells) {
            if let Some(idx) = *cell {
                let current = cells[idx];
                if is_empty_cell(current) || p.z < current {
                    cells[idx] = p.z;
                }
            }
        }

        debug!(cols, rows, cell_size, "elevation grid built");

        Ok(Some(Rasterization {
            grid: ElevationGrid {
                cols,
                rows,
                origin,
                cell_size: cs,
                cells,
            },
            point_cells,
        }))
    }

    /// A grid with the same geometry as `self` holding `cells`.
    pub fn with_cells(&self, cells: Vec<f32>) -> Self {
        assert_eq!(cells.len(), self.cells.len(), "cell buffer does not match grid geometry");
        Self {
            cols: self.cols,
            rows: self.rows,
            origin: self.origin,
            cell_size: self.cell_size,
            cells,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Planar coordinates of the lower corner of cell (0, 0).
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    #[inline]
    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, col: usize, row: usize) -> f32 {
        self.cells[self.index(col, row)]
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|v| is_empty_cell(**v)).count()
    }

    /// In-fill empty cells by 3x3 dilation from filled neighbours.
    ///
    /// Cells are reached layer by layer outwards from the filled ones. Each
    /// newly reached cell takes the maximum of its neighbours from earlier
    /// layers, which is the value repeated whole-grid dilation passes would
    /// give it, at one visit per cell. A grid with no filled cell is
    /// returned unchanged.
    pub fn filled(&self) -> ElevationGrid {
        let mut cells = self.cells.clone();
        let mut reached: Vec<bool> = cells.iter().map(|v| !is_empty_cell(*v)).collect();
        let mut frontier: Vec<usize> = (0..cells.len()).filter(|&idx| reached[idx]).collect();

        if frontier.is_empty() || frontier.len() == cells.len() {
            return self.clone();
        }

        let mut passes = 0usize;
        loop {
            let mut next = Vec::new();
            for &idx in &frontier {
                for n in self.neighbours(idx) {
                    if !reached[n] {
                        reached[n] = true;
                        next.push(n);
                    }
                }
            }

            if next.is_empty() {
                break;
            }

            // all of `next` is still empty here, so only earlier layers count
            let values: Vec<f32> = next
                .iter()
                .map(|&idx| self.neighbour_max(&cells, idx))
                .collect();
            for (&idx, value) in next.iter().zip(values) {
                cells[idx] = value;
            }

            frontier = next;
            passes += 1;
        }

        debug!(passes, "empty elevation cells in-filled");

        self.with_cells(cells)
    }

    /// Indices of the 3x3 neighbourhood of `idx`, clipped at the border
    fn neighbours(&self, idx: usize) -> impl Iterator<Item = usize> {
        let cols = self.cols;
        let col = idx % cols;
        let row = idx / cols;
        let col_range = col.saturating_sub(1)..=(col + 1).min(cols - 1);

        (row.saturating_sub(1)..=(row + 1).min(self.rows - 1))
            .flat_map(move |r| col_range.clone().map(move |c| r * cols + c))
    }

    fn neighbour_max(&self, cells: &[f32], idx: usize) -> f32 {
        self.neighbours(idx)
            .map(|n| cells[n])
            .filter(|v| !is_empty_cell(*v))
            .reduce(f32::max)
            .unwrap_or(EMPTY_CELL)
    }
}

fn axis_cells(min: f32, max: f32, cell_size: f64) -> Result<usize> {
    let cells = ((max as f64 - min as f64) / cell_size).ceil() + 1.0;
    if !cells.is_finite() || cells > MAX_AXIS_CELLS {
        return Err(Error::InvalidGeometry(format!(
            "extent {} with cell size {} does not fit in a grid",
            max - min,
            cell_size
        )));
    }
    Ok(cells as usize)
}
