//! Seeded xorshift32 generator.
//!
//! Runs must be reproducible from the seed alone, so nothing here touches
//! the OS entropy source.

use glam::Vec2;

#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// A seed of 0 is treated as 1; xorshift never leaves the zero state.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in `[min, max)`.
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform in `[0, max)`. Returns 0 for `max == 0`.
    pub fn below(&mut self, max: u32) -> u32 {
        ((u64::from(self.next_u32()) * u64::from(max)) >> 32) as u32
    }

    /// Unit vector with a uniformly random heading.
    pub fn unit(&mut self) -> Vec2 {
        Vec2::from_angle(self.range(0.0, std::f32::consts::TAU))
    }

    /// Point uniformly inside the axis-aligned box `[0, size)`.
    pub fn point_in(&mut self, size: Vec2) -> Vec2 {
        Vec2::new(self.range(0.0, size.x), self.range(0.0, size.y))
    }
}
