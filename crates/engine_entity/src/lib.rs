//! # engine_entity
//!
//! Identity and ordering primitives shared by every simulation prototype.
//!
//! This crate provides:
//!
//! - [`EntityId`]: lightweight `u64` entity identifiers.
//! - [`EntityAllocator`]: monotonically increasing ID allocator.
//! - [`TypeTag`] / [`KindTable`]: first-seen index per concrete entity kind.
//! - [`Depth`]: finite, totally ordered scheduling priority.
//! - [`EntityError`]: errors raised by entity operations.

pub mod depth;
pub mod entity;
pub mod error;
pub mod kind;

pub use depth::Depth;
pub use entity::{EntityAllocator, EntityId};
pub use error::EntityError;
pub use kind::{KindTable, TypeTag};
