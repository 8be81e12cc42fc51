//! Progressive morphological filter
//!
//! Ground extraction after Zhang et al. (2003), "A progressive morphological
//! filter for removing nonground measurements from airborne LIDAR data".
//!
//! The cloud is rasterised into a minimum-elevation grid which is opened
//! with a sequence of growing square windows. At every step, cells whose
//! elevation drops by more than the step's threshold are flagged as
//! non-ground; the opened grid becomes the working surface of the next step.
//! A point is ground when its cell was never flagged and it lies within the
//! last threshold of the final surface.

use crate::elevation_grid::{ElevationGrid, Rasterization};
use crate::morphology;
use crate::partition::GroundIndices;
use groundcrate_core::{
    is_finite_point, PointCloud3f, Result, SegmentationConfig, DEFAULT_MAX_GRID_BYTES,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Smallest window of the exponential sequence.
pub const INITIAL_WINDOW_SIZE: usize = 3;

/// Filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmfParams {
    /// Largest window, in cells
    pub max_window_size: usize,
    pub slope: f32,
    pub initial_distance: f32,
    pub max_distance: f32,
    /// Edge length of a grid cell, in coordinate units
    pub cell_size: f32,
}

impl PmfParams {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            max_window_size: config.max_window_size,
            slope: config.slope,
            initial_distance: config.initial_distance,
            max_distance: config.max_distance,
            cell_size: config.effective_cell_size(),
        }
    }
}

impl Default for PmfParams {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

/// Window sizes `w_k = 2^(k+1) + 1` (3, 5, 9, 17, 33, ...) up to
/// `max_window_size`, the last one clamped to the largest odd size not
/// above it.
///
/// Windows are always odd, so every opening is centred and never wider
/// than `max_window_size`. A limit below the initial window gives the
/// single window 1.
pub fn window_sizes(max_window_size: usize) -> Vec<usize> {
    let limit = if max_window_size % 2 == 0 {
        max_window_size.saturating_sub(1).max(1)
    } else {
        max_window_size
    };

    if limit < INITIAL_WINDOW_SIZE {
        return vec![1];
    }

    let mut windows = Vec::new();
    let mut k = 0u32;
    loop {
        let w = 2usize.saturating_pow(k + 1).saturating_add(1);
        if w >= limit {
            windows.push(limit);
            return windows;
        }
        windows.push(w);
        k += 1;
    }
}

/// Elevation threshold of each window:
/// `min(slope * (w_i - w_{i-1}) * cell_size + initial_distance, max_distance)`
/// with `w_{-1} = w_0`.
pub fn thresholds(
    windows: &[usize],
    slope: f32,
    initial_distance: f32,
    max_distance: f32,
    cell_size: f32,
) -> Vec<f32> {
    windows
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let previous = if i == 0 { w } else { windows[i - 1] };
            let growth = (w - previous) as f32;
            (slope * growth * cell_size + initial_distance).min(max_distance)
        })
        .collect()
}

/// One opening step of the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmfIteration {
    pub window: usize,
    pub threshold: f32,
}

/// Result of a single [`PmfIteration`]
#[derive(Debug, Clone)]
pub struct PmfIterationOutcome {
    /// The opened surface, used as the working surface of the next step
    pub opened: ElevationGrid,
    /// Cells whose elevation dropped by more than the threshold
    pub flagged: Vec<bool>,
}

impl PmfIteration {
    /// Open `surface` and flag the cells that rise above the opening.
    ///
    /// `surface` must not contain empty cells.
    pub fn run(&self, surface: &ElevationGrid) -> PmfIterationOutcome {
        let opened = morphology::open(surface, self.window);
        let flagged = surface
            .cells()
            .par_iter()
            .zip(opened.cells().par_iter())
            .map(|(z, o)| z - o > self.threshold)
            .collect();

        PmfIterationOutcome { opened, flagged }
    }
}

/// Progressive morphological ground filter
#[derive(Debug, Clone)]
pub struct ProgressiveMorphologicalFilter {
    params: PmfParams,
    max_grid_bytes: usize,
}

impl ProgressiveMorphologicalFilter {
    pub fn new(params: PmfParams) -> Self {
        Self {
            params,
            max_grid_bytes: DEFAULT_MAX_GRID_BYTES,
        }
    }

    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self::new(PmfParams::from_config(config)).with_max_grid_bytes(config.max_grid_bytes)
    }

    /// Memory ceiling for the elevation grids
    pub fn with_max_grid_bytes(mut self, max_grid_bytes: usize) -> Self {
        self.max_grid_bytes = max_grid_bytes;
        self
    }

    pub fn params(&self) -> &PmfParams {
        &self.params
    }

    /// The window / threshold schedule, smallest window first
    pub fn iterations(&self) -> Vec<PmfIteration> {
        let p = &self.params;
        let windows = window_sizes(p.max_window_size);
        let thresholds =
            thresholds(&windows, p.slope, p.initial_distance, p.max_distance, p.cell_size);

        windows
            .into_iter()
            .zip(thresholds)
            .map(|(window, threshold)| PmfIteration { window, threshold })
            .collect()
    }

    /// Classify the points of `cloud`, returning the indices of ground points.
    ///
    /// Points with non-finite coordinates are never ground.
    pub fn extract(&self, cloud: &PointCloud3f) -> Result<GroundIndices> {
        if cloud.is_empty() {
            return Ok(GroundIndices::default());
        }

        let Some(Rasterization { grid, point_cells }) =
            ElevationGrid::from_points(&cloud.points, self.params.cell_size, self.max_grid_bytes)?
        else {
            warn!(points = cloud.len(), "no finite points to classify");
            return Ok(GroundIndices::default());
        };

        if grid.len() == 1 {
            debug!("single-cell elevation grid, every finite point is ground");
            return Ok(cloud
                .iter()
                .enumerate()
                .filter(|(_, p)| is_finite_point(p))
                .map(|(idx, _)| idx)
                .collect());
        }

        let iterations = self.iterations();
        let mut surface = grid.filled();
        let mut non_ground = vec![false; surface.len()];

        for iteration in &iterations {
            let PmfIterationOutcome { opened, flagged } = iteration.run(&surface);

            let mut newly_flagged = 0usize;
            for (acc, flag) in non_ground.iter_mut().zip(flagged) {
                if flag && !*acc {
                    *acc = true;
                    newly_flagged += 1;
                }
            }

            debug!(
                window = iteration.window,
                threshold = iteration.threshold,
                newly_flagged,
                "morphological iteration"
            );

            surface = opened;
        }

        let tolerance = iterations
            .last()
            .map(|it| it.threshold)
            .unwrap_or(self.params.initial_distance);

        let ground: GroundIndices = cloud
            .iter()
            .zip(&point_cells)
            .enumerate()
            .filter_map(|(idx, (p, cell))| {
                let cell = (*cell)?;
                let on_surface = p.z <= surface.cells()[cell] + tolerance;
                (!non_ground[cell] && on_surface).then_some(idx)
            })
            .collect();

        info!(
            points = cloud.len(),
            ground = ground.len(),
            iterations = iterations.len(),
            cols = grid.cols(),
            rows = grid.rows(),
            "progressive morphological filter complete"
        );

        Ok(ground)
    }
}
