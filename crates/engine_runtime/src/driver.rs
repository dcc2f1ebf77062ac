//! Frame driver.
//!
//! One frame is exactly [`Registry::tick`] followed by [`Registry::render`].
//! Frames never overlap. Callers that keep an external spatial index can
//! rebuild it between the two through [`FrameDriver::frame_with`]; entity
//! positions are final after post-update and untouched until render.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::behaviour::FrameInfo;
use crate::config::{ConfigError, FrameConfig};
use crate::registry::Registry;

/// Drives a [`Registry`] one frame at a time.
#[derive(Debug)]
pub struct FrameDriver {
    /// Last frame started; 0 before the first.
    frame_id: u64,
    config: FrameConfig,
    registry: Registry,
}

impl FrameDriver {
    /// Create a driver around an existing registry.
    #[must_use]
    pub fn new(config: FrameConfig, registry: Registry) -> Self {
        Self {
            frame_id: 0,
            config,
            registry,
        }
    }

    /// Returns the id of the last frame run.
    #[must_use]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[must_use]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Consume the driver and hand back the registry.
    #[must_use]
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Run one frame.
    pub fn frame(&mut self, dt: f64) -> FrameInfo {
        self.frame_with(dt, |_| {})
    }

    /// Run one frame, calling `between` after post-update and before render.
    pub fn frame_with<F>(&mut self, dt: f64, between: F) -> FrameInfo
    where
        F: FnOnce(&mut Registry),
    {
        self.frame_id += 1;
        let frame = FrameInfo::new(self.frame_id, dt);

        debug!(frame = frame.id, dt, live = self.registry.len(), "frame start");
        self.registry.tick(frame);
        between(&mut self.registry);
        self.registry.render(frame);
        frame
    }

    /// Run the fixed-timestep loop until a configured stop condition holds.
    ///
    /// Returns the number of frames run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFrameRate`] if the config is invalid.
    pub fn run(&mut self) -> Result<u64, ConfigError> {
        self.run_with(|_| {})
    }

    /// [`run`](Self::run), calling `between` in every frame as
    /// [`frame_with`](Self::frame_with) does.
    ///
    /// With neither `max_frames` nor `stop_when_empty` set this never
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFrameRate`] if the config is invalid.
    pub fn run_with<F>(&mut self, mut between: F) -> Result<u64, ConfigError>
    where
        F: FnMut(&mut Registry),
    {
        self.config.validate()?;
        let frame_duration = self.config.frame_duration();
        let dt = frame_duration.as_secs_f64();
        let mut frame_count = 0u64;

        info!(
            frame_rate = self.config.frame_rate,
            max_frames = self.config.max_frames,
            stop_when_empty = self.config.stop_when_empty,
            "starting frame loop"
        );

        loop {
            if self.config.stop_when_empty && self.registry.is_idle() {
                info!(frames = frame_count, "registry empty, frame loop complete");
                break;
            }

            let start = Instant::now();
            self.frame_with(dt, &mut between);

            frame_count += 1;
            if self.config.max_frames > 0 && frame_count >= self.config.max_frames {
                info!(frames = frame_count, "frame loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame = self.frame_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }

        Ok(frame_count)
    }
}
