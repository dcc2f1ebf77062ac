//! # engine_runtime
//!
//! The entity lifecycle and depth-ordered scheduling engine shared by the
//! simulation prototypes (ant colony, cellular automaton viewer, swarm demos).
//!
//! This crate provides:
//!
//! - [`Behaviour`]: per-entity lifecycle hooks with no-op defaults.
//! - [`HookContext`]: what a hook can see and touch while it runs.
//! - [`Registry`]: owns every entity, the live set, the type index and the
//!   deferred add/remove queues.
//! - [`DepthIndex`]: the deterministic iteration order over live entities.
//! - [`FrameDriver`]: runs `tick` then `render`, once per frame.
//! - [`FrameConfig`]: frame rate and stop conditions for the driver.
//!
//! ## Frame lifecycle
//!
//! 1. Flush pending removals (`on_remove`, then purge).
//! 2. Flush pending additions (`start`, then index).
//! 3. Pre-update, update and post-update passes in depth order.
//! 4. Optional caller work between simulation and render (spatial index
//!    rebuilds and the like).
//! 5. Render pass over visible entities in depth order.
//!
//! Hooks may enqueue, destroy or reprioritise any entity, themselves
//! included, at any point. Structural changes only land at the next flush
//! and depth changes only land at the next pass.

pub mod behaviour;
pub mod config;
pub mod depth_index;
pub mod driver;
pub mod registry;

pub use behaviour::{Behaviour, FrameInfo, HookContext, Phase};
pub use config::{ConfigError, FrameConfig};
pub use depth_index::DepthIndex;
pub use driver::FrameDriver;
pub use registry::{DestroyTrigger, Membership, Registry};

pub use engine_entity::{Depth, EntityError, EntityId, TypeTag};
