//! Depth-ordered iteration index.
//!
//! Live entities iterate by **descending** depth; equal depths iterate by
//! **ascending** id. Since ids are handed out in creation order, the result
//! is fully deterministic for any live set.
//!
//! ## Lazy reconciliation
//!
//! The ordered set is keyed by `(depth, id)`. Removing an entry needs the
//! exact key it was inserted under, so a depth write cannot simply update
//! the entity's field and move on. Instead:
//!
//! 1. [`DepthIndex::notify`] records the entity's pre-change depth in a
//!    pending map. Only the first unsynced change is recorded; later writes
//!    before the next sync keep that anchor.
//! 2. The caller stores the new depth on the entity straight away, so reads
//!    observe it immediately.
//! 3. [`DepthIndex::sync`] runs before every pass: each pending entity is
//!    removed under its anchor and reinserted under its current depth.
//!
//! A depth change made in the middle of a pass therefore never reshapes that
//! pass; it takes effect at the next sync.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use engine_entity::{Depth, EntityId};

/// Sort key: higher depth first, then lower id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DepthKey {
    depth: Depth,
    id: EntityId,
}

impl Ord for DepthKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for DepthKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic total order over indexed entities.
#[derive(Debug, Default)]
pub struct DepthIndex {
    order: BTreeSet<DepthKey>,
    /// Entities with a registered depth-change listener.
    listeners: HashSet<EntityId>,
    /// Anchor depth (the key in `order`) for entities changed since the last sync.
    pending: BTreeMap<EntityId, Depth>,
}

impl DepthIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the depth listener for `id` and index it under `depth`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is already indexed.
    pub fn insert(&mut self, id: EntityId, depth: Depth) {
        assert!(self.listeners.insert(id), "{id} inserted into depth index twice");
        self.order.insert(DepthKey { depth, id });
    }

    /// Unregister the listener for `id` and drop it from the order.
    ///
    /// `current` is the entity's stored depth; if a change is pending the
    /// anchor is used instead. Returns `false` if `id` was not indexed.
    pub fn remove(&mut self, id: EntityId, current: Depth) -> bool {
        if !self.listeners.remove(&id) {
            return false;
        }
        let depth = self.pending.remove(&id).unwrap_or(current);
        let removed = self.order.remove(&DepthKey { depth, id });
        assert!(removed, "{id} missing from depth order under key {depth}");
        true
    }

    /// Depth-change listener. Call before storing `new` on the entity.
    ///
    /// Returns `true` if `id` is indexed (and the change is therefore
    /// tracked), `false` if the caller should just write the field.
    pub fn notify(&mut self, id: EntityId, old: Depth, new: Depth) -> bool {
        if !self.listeners.contains(&id) {
            return false;
        }
        if old != new {
            self.pending.entry(id).or_insert(old);
        }
        true
    }

    /// Apply every pending depth change to the order.
    ///
    /// `current` resolves an entity's stored depth.
    ///
    /// # Panics
    ///
    /// Panics if a pending entity is missing from the order or `current`
    /// does not know it; both mean the index was corrupted.
    pub fn sync(&mut self, current: impl Fn(EntityId) -> Option<Depth>) {
        if self.pending.is_empty() {
            return;
        }
        for (id, anchor) in std::mem::take(&mut self.pending) {
            let removed = self.order.remove(&DepthKey { depth: anchor, id });
            assert!(removed, "{id} missing from depth order under key {anchor}");
            let Some(depth) = current(id) else {
                panic!("{id} is indexed but has no stored depth");
            };
            self.order.insert(DepthKey { depth, id });
        }
    }

    /// Sync, then snapshot the order.
    ///
    /// Each call yields an independent ordering; later depth writes never
    /// affect a snapshot already taken.
    pub fn ordered(&mut self, current: impl Fn(EntityId) -> Option<Depth>) -> Vec<EntityId> {
        self.sync(current);
        self.iter().collect()
    }

    /// Iterate the order as of the last sync.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.order.iter().map(|key| key.id)
    }

    /// Returns `true` if `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.listeners.contains(&id)
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of entities with an unsynced depth change.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every entry, listener and pending change.
    pub fn clear(&mut self) {
        self.order.clear();
        self.listeners.clear();
        self.pending.clear();
    }
}
