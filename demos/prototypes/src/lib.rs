//! Shared plumbing for the prototype binaries.
//!
//! Each prototype builds a [`Registry`](engine_runtime::Registry), seeds it
//! with entities and hands it to a [`FrameDriver`](engine_runtime::FrameDriver).
//! This crate holds the bits they have in common: the loop CLI flags, log
//! setup, a seeded RNG, an ASCII canvas for render hooks and a uniform grid
//! rebuilt between post-update and render.

pub mod canvas;
pub mod grid;
pub mod random;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use engine_runtime::FrameConfig;
use tracing_subscriber::EnvFilter;

pub use canvas::Canvas;
pub use grid::SpatialGrid;
pub use random::SeededRandom;

/// Frames run when neither a flag nor a config file says otherwise.
pub const DEFAULT_FRAMES: u64 = 600;

/// Frame loop flags shared by every prototype.
#[derive(Debug, Clone, Default, Args)]
pub struct LoopArgs {
    /// Number of frames to run (0 = unlimited)
    #[arg(short, long)]
    pub frames: Option<u64>,

    /// Target frames per second
    #[arg(short, long)]
    pub rate: Option<f64>,

    /// JSON frame config; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Stop as soon as no entity is live or queued
    #[arg(long)]
    pub until_empty: bool,
}

impl LoopArgs {
    /// Resolve the frame config: file (or defaults), then flag overrides.
    ///
    /// # Errors
    ///
    /// Fails if the config file cannot be loaded or the result is invalid.
    pub fn frame_config(&self) -> Result<FrameConfig> {
        let mut config = match &self.config {
            Some(path) => FrameConfig::from_json_file(path)
                .with_context(|| format!("loading frame config {}", path.display()))?,
            None => FrameConfig::default().with_max_frames(DEFAULT_FRAMES),
        };
        if let Some(frames) = self.frames {
            config = config.with_max_frames(frames);
        }
        if let Some(rate) = self.rate {
            config = config.with_frame_rate(rate);
        }
        if self.until_empty {
            config = config.stopping_when_empty();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Install the fmt subscriber with `RUST_LOG` support, defaulting the
/// calling binary and this crate to `info`.
///
/// # Errors
///
/// Fails if `target` is not a valid filter directive.
pub fn init_tracing(target: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("{target}=info").parse()?)
                .add_directive("prototypes=info".parse()?),
        )
        .init();
    Ok(())
}
