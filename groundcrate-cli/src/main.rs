//! `groundcrate` command-line tool
//!
//! Reads a point cloud, separates ground from obstacle points and writes
//! the obstacle points as ASCII PCD.

use anyhow::{Context, Result};
use clap::Parser;
use groundcrate_algorithms::GroundSegmentationPipeline;
use groundcrate_io::{load_config, read_point_cloud, write_obstacles, DEFAULT_CONFIG_PATH};
use std::path::PathBuf;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input point cloud (.pcd or .ply)
    input: PathBuf,

    /// Segmentation parameters in `key = value` form
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Where the obstacle points are written
    #[arg(long, default_value = "filtered_cloud.pcd")]
    output: PathBuf,

    /// Log level, overridden by RUST_LOG when set
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.log_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    let loaded = load_config(&args.config);

    let cloud = read_point_cloud(&args.input)
        .with_context(|| format!("failed to read point cloud {}", args.input.display()))?;
    info!(points = cloud.len(), input = %args.input.display(), "point cloud loaded");

    let pipeline = GroundSegmentationPipeline::new(loaded.config);
    let segmentation = pipeline.run(cloud).context("ground segmentation failed")?;

    let stats = &segmentation.stats;
    info!(
        input = stats.input,
        downsampled = stats.downsampled,
        ground = stats.ground,
        obstacle = stats.obstacle,
        "segmentation finished"
    );

    write_obstacles(&segmentation.obstacle, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    Ok(())
}
