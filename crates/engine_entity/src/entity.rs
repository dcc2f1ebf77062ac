//! Entity identity.
//!
//! Ids double as the tie-break key of the depth order: two entities at the
//! same depth run in ascending id order. That only means "creation order"
//! if a registry never hands the same number out twice and never goes
//! backwards, which is what [`EntityAllocator`] guarantees. Nothing else is
//! encoded in an id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle naming one entity of one registry.
///
/// Ordering is numeric. Serialises as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out ids for a single registry.
///
/// The first id is `1`; every later one is one greater than the last.
/// Retired ids are not recycled, so an id seen once is never seen again
/// for a different entity.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Issue the next id.
    ///
    /// # Panics
    ///
    /// Panics once the `u64` range is used up.
    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        let Some(next) = id.checked_add(1) else {
            panic!("entity id space exhausted");
        };
        self.next = next;
        EntityId(id)
    }

    /// Returns `true` if `id` came out of this allocator.
    #[must_use]
    pub fn issued(&self, id: EntityId) -> bool {
        (1..self.next).contains(&id.0)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
