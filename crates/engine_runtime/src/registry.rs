//! Entity registry: owns every entity and the live set.
//!
//! The [`Registry`] is the single owner of entity records. It keeps:
//!
//! - the entity arena (id → record), including detached and queued entities;
//! - the live map (id → type tag) and the type index (tag → ids);
//! - the pending-add and pending-remove sets;
//! - the [`DepthIndex`] used for every pass.
//!
//! Structural changes requested at any time (from hooks or from outside a
//! frame) are parked in the pending sets and applied at the top of
//! [`Registry::tick`], so a pass in progress never sees the live set change
//! underneath it.
//!
//! ## Destroy before first activation
//!
//! An entity destroyed (or removed) while still pending addition leaves the
//! queues at the next flush without running either `start` or `on_remove`. Its
//! destroy triggers still fire, since they fire at the moment of
//! destruction.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, info, trace};
use uuid::Uuid;

use engine_entity::{Depth, EntityAllocator, EntityError, EntityId, KindTable, TypeTag};

use crate::behaviour::{Behaviour, FrameInfo, HookContext, Phase};
use crate::depth_index::DepthIndex;

/// Cleanup callback run once, when an entity is first destroyed.
pub type DestroyTrigger = Box<dyn FnOnce(&mut Registry, EntityId)>;

/// Where an entity currently sits in the lifecycle.
///
/// Holding this as a single field is what keeps an entity in at most one of
/// pending-add, live and pending-remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    /// Created (or purged) but not scheduled.
    Detached,
    /// Waiting for the next flush to run `start` and go live.
    PendingAdd,
    /// Indexed and scheduled every frame.
    Live,
    /// Still indexed; purged at the next flush.
    PendingRemove,
}

struct EntityRecord {
    tag: TypeTag,
    depth: Depth,
    active: bool,
    visible: bool,
    destroyed: bool,
    /// `start` has run since the entity was last detached.
    started: bool,
    membership: Membership,
    triggers: Vec<DestroyTrigger>,
    /// `None` while one of this entity's hooks is running.
    behaviour: Option<Box<dyn Behaviour>>,
}

impl EntityRecord {
    fn new(tag: TypeTag, behaviour: Box<dyn Behaviour>) -> Self {
        Self {
            tag,
            depth: Depth::ZERO,
            active: true,
            visible: true,
            destroyed: false,
            started: false,
            membership: Membership::Detached,
            triggers: Vec::new(),
            behaviour: Some(behaviour),
        }
    }
}

/// Owns all entities of one simulation and schedules their hooks.
pub struct Registry {
    /// Distinguishes this simulation in log output.
    instance_id: Uuid,
    allocator: EntityAllocator,
    kinds: KindTable,
    records: HashMap<EntityId, EntityRecord>,
    /// The live set: indexed entities and their type tag.
    live: HashMap<EntityId, TypeTag>,
    by_type: HashMap<TypeTag, BTreeSet<EntityId>>,
    pending_add: BTreeSet<EntityId>,
    pending_remove: BTreeSet<EntityId>,
    depth_index: DepthIndex,
    /// Ids dropped by [`reset`](Self::reset) without being destroyed.
    discarded: HashSet<EntityId>,
}

impl Registry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            allocator: EntityAllocator::new(),
            kinds: KindTable::new(),
            records: HashMap::new(),
            live: HashMap::new(),
            by_type: HashMap::new(),
            pending_add: BTreeSet::new(),
            pending_remove: BTreeSet::new(),
            depth_index: DepthIndex::new(),
            discarded: HashSet::new(),
        }
    }

    /// Unique id of this registry, attached to its log events.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    // ── Creation and structural changes ──────────────────────────────

    /// Create a detached entity. Call [`enqueue`](Self::enqueue) to schedule it.
    ///
    /// New entities are active, visible and at depth 0.
    pub fn create<B: Behaviour>(&mut self, behaviour: B) -> EntityId {
        let id = self.allocator.allocate();
        let tag = self.kinds.register::<B>();
        let previous = self
            .records
            .insert(id, EntityRecord::new(tag, Box::new(behaviour)));
        assert!(previous.is_none(), "entity id collision: {id}");
        trace!(
            registry = %self.instance_id,
            entity = %id,
            kind = self.kinds.name(tag).unwrap_or_default(),
            "entity created"
        );
        id
    }

    /// Create an entity and schedule it for the next frame boundary.
    pub fn spawn<B: Behaviour>(&mut self, behaviour: B) -> EntityId {
        let id = self.create(behaviour);
        self.pending_add.insert(id);
        if let Some(record) = self.records.get_mut(&id) {
            record.membership = Membership::PendingAdd;
        }
        id
    }

    /// Schedule `id` for activation at the next frame boundary.
    ///
    /// A pending removal is cancelled instead: re-adding wins. Entities that
    /// are already pending addition or live are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownEntity`] if `id` is not in this registry.
    pub fn enqueue(&mut self, id: EntityId) -> Result<EntityId, EntityError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EntityError::UnknownEntity(id))?;
        match record.membership {
            Membership::Detached => {
                record.membership = Membership::PendingAdd;
                self.pending_add.insert(id);
            }
            Membership::PendingRemove => {
                self.pending_remove.remove(&id);
                if record.started {
                    record.membership = Membership::Live;
                } else {
                    record.membership = Membership::PendingAdd;
                    self.pending_add.insert(id);
                }
                debug!(registry = %self.instance_id, entity = %id, "pending removal cancelled");
            }
            Membership::PendingAdd | Membership::Live => {}
        }
        Ok(id)
    }

    /// Schedule `id` for removal at the next frame boundary without marking
    /// it destroyed. A removed entity is detached after the flush and may be
    /// enqueued again later, in which case `start` runs again.
    ///
    /// Unknown or detached entities are ignored.
    pub fn remove(&mut self, id: EntityId) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        match record.membership {
            Membership::Live => {}
            Membership::PendingAdd => {
                self.pending_add.remove(&id);
            }
            Membership::Detached | Membership::PendingRemove => return,
        }
        record.membership = Membership::PendingRemove;
        self.pending_remove.insert(id);
    }

    /// Destroy `id`.
    ///
    /// The first call marks the entity destroyed, runs its destroy triggers
    /// in registration order and schedules its removal. Later calls, and
    /// calls with unknown ids, do nothing and return `false`.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        if record.destroyed {
            return false;
        }
        record.destroyed = true;
        let triggers = std::mem::take(&mut record.triggers);
        debug!(
            registry = %self.instance_id,
            entity = %id,
            triggers = triggers.len(),
            "entity destroyed"
        );

        for trigger in triggers {
            trigger(self, id);
        }

        self.remove(id);
        // Never scheduled, so no flush will ever collect it.
        if self.membership(id) == Some(Membership::Detached) {
            self.records.remove(&id);
        }
        true
    }

    /// Register an extra cleanup callback, run when `id` is first destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownEntity`] if `id` is not in this registry.
    pub fn add_destroy_trigger<F>(&mut self, id: EntityId, trigger: F) -> Result<(), EntityError>
    where
        F: FnOnce(&mut Registry, EntityId) + 'static,
    {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EntityError::UnknownEntity(id))?;
        record.triggers.push(Box::new(trigger));
        Ok(())
    }

    /// Drop every entity, index and queue. No hooks or triggers run.
    ///
    /// The id allocator keeps counting, so ids stay unique across resets.
    /// Entities dropped here without having been destroyed keep reporting
    /// `false` from [`is_destroyed`](Self::is_destroyed).
    pub fn reset(&mut self) {
        info!(
            registry = %self.instance_id,
            entities = self.records.len(),
            "registry reset"
        );
        self.discarded.extend(
            self.records
                .iter()
                .filter(|(_, record)| !record.destroyed)
                .map(|(id, _)| *id),
        );
        self.records.clear();
        self.live.clear();
        self.by_type.clear();
        self.pending_add.clear();
        self.pending_remove.clear();
        self.depth_index.clear();
    }

    // ── Entity state ─────────────────────────────────────────────────

    /// Stored depth of `id`, if the entity exists.
    #[must_use]
    pub fn depth(&self, id: EntityId) -> Option<Depth> {
        self.records.get(&id).map(|record| record.depth)
    }

    /// Set the depth of `id`.
    ///
    /// The new value is readable immediately. For indexed entities the
    /// iteration order only changes at the start of the next pass.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidValue`] for NaN or infinite values and
    /// [`EntityError::UnknownEntity`] if `id` is not in this registry.
    pub fn set_depth(&mut self, id: EntityId, value: f64) -> Result<(), EntityError> {
        let depth = Depth::new(value)?;
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EntityError::UnknownEntity(id))?;
        if self.depth_index.notify(id, record.depth, depth) {
            trace!(
                registry = %self.instance_id,
                entity = %id,
                from = %record.depth,
                to = %depth,
                "depth change deferred"
            );
        }
        record.depth = depth;
        Ok(())
    }

    /// Toggle whether the update passes run for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownEntity`] if `id` is not in this registry.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<(), EntityError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EntityError::UnknownEntity(id))?;
        record.active = active;
        Ok(())
    }

    /// Toggle whether the render pass runs for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownEntity`] if `id` is not in this registry.
    pub fn set_visible(&mut self, id: EntityId, visible: bool) -> Result<(), EntityError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(EntityError::UnknownEntity(id))?;
        record.visible = visible;
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self, id: EntityId) -> bool {
        self.records.get(&id).is_some_and(|record| record.active)
    }

    #[must_use]
    pub fn is_visible(&self, id: EntityId) -> bool {
        self.records.get(&id).is_some_and(|record| record.visible)
    }

    /// Returns `true` once `id` has been destroyed, including after its
    /// record has been purged. Ids this registry never issued report `false`.
    #[must_use]
    pub fn is_destroyed(&self, id: EntityId) -> bool {
        match self.records.get(&id) {
            Some(record) => record.destroyed,
            // Purged records are only ever dropped after destruction or by `reset`.
            None => self.allocator.issued(id) && !self.discarded.contains(&id),
        }
    }

    /// Lifecycle position of `id`, or `None` if unknown.
    #[must_use]
    pub fn membership(&self, id: EntityId) -> Option<Membership> {
        self.records.get(&id).map(|record| record.membership)
    }

    /// Type tag of `id`, or `None` if unknown.
    #[must_use]
    pub fn tag(&self, id: EntityId) -> Option<TypeTag> {
        self.records.get(&id).map(|record| record.tag)
    }

    /// Borrow the behaviour of `id` as its concrete type.
    ///
    /// Returns `None` for unknown ids, a different type, or an entity whose
    /// own hook is currently running.
    #[must_use]
    pub fn get<T: Behaviour>(&self, id: EntityId) -> Option<&T> {
        self.records
            .get(&id)?
            .behaviour
            .as_deref()?
            .downcast_ref::<T>()
    }

    /// Mutable counterpart of [`get`](Self::get).
    #[must_use]
    pub fn get_mut<T: Behaviour>(&mut self, id: EntityId) -> Option<&mut T> {
        self.records
            .get_mut(&id)?
            .behaviour
            .as_deref_mut()?
            .downcast_mut::<T>()
    }

    // ── Live set queries ─────────────────────────────────────────────

    /// Number of live (indexed) entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Returns `true` if nothing is live and nothing is waiting to go live.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.live.is_empty() && self.pending_add.is_empty()
    }

    /// Returns `true` if `id` is in the live set.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains_key(&id)
    }

    #[must_use]
    pub fn is_pending_add(&self, id: EntityId) -> bool {
        self.pending_add.contains(&id)
    }

    #[must_use]
    pub fn is_pending_remove(&self, id: EntityId) -> bool {
        self.pending_remove.contains(&id)
    }

    /// `(pending additions, pending removals)`.
    #[must_use]
    pub fn pending_counts(&self) -> (usize, usize) {
        (self.pending_add.len(), self.pending_remove.len())
    }

    /// Type tag assigned to `T`, if any entity of that type was created.
    #[must_use]
    pub fn tag_of<T: Behaviour>(&self) -> Option<TypeTag> {
        self.kinds.get::<T>()
    }

    /// Live entities with type tag `tag`, in id order. Unknown tags yield
    /// nothing.
    pub fn entities_with_tag(&self, tag: TypeTag) -> impl Iterator<Item = EntityId> + '_ {
        self.by_type.get(&tag).into_iter().flatten().copied()
    }

    /// Live entities whose behaviour is a `T`, in id order.
    pub fn entities_of<T: Behaviour>(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.tag_of::<T>()
            .and_then(|tag| self.by_type.get(&tag))
            .into_iter()
            .flatten()
            .copied()
    }

    /// Number of live entities whose behaviour is a `T`.
    #[must_use]
    pub fn count_of<T: Behaviour>(&self) -> usize {
        self.tag_of::<T>()
            .and_then(|tag| self.by_type.get(&tag))
            .map_or(0, BTreeSet::len)
    }

    /// Apply pending depth changes and return the live set in iteration order.
    pub fn ordered_ids(&mut self) -> Vec<EntityId> {
        let records = &self.records;
        self.depth_index
            .ordered(|id| records.get(&id).map(|record| record.depth))
    }

    // ── Frame ────────────────────────────────────────────────────────

    /// Run one simulation step: flush removals, flush additions, then the
    /// pre-update, update and post-update passes.
    ///
    /// Both queues are taken before either flush runs. Anything a `start` or
    /// `on_remove` hook enqueues, spawns or removes lands in fresh queues and
    /// waits for the next tick.
    pub fn tick(&mut self, frame: FrameInfo) {
        let removals = std::mem::take(&mut self.pending_remove);
        let additions = std::mem::take(&mut self.pending_add);
        let removed = self.flush_removals(removals, frame);
        let added = self.flush_additions(additions, frame);
        self.check_queues();

        debug!(
            registry = %self.instance_id,
            frame = frame.id,
            removed,
            added,
            live = self.live.len(),
            "flushed structural changes"
        );

        for phase in Phase::PASSES {
            self.run_pass(phase, frame);
        }
    }

    /// Run the render pass over visible live entities in depth order.
    pub fn render(&mut self, frame: FrameInfo) {
        for id in self.ordered_ids() {
            if self.is_visible(id) {
                self.invoke(id, Phase::Render, frame);
            }
        }
    }

    fn run_pass(&mut self, phase: Phase, frame: FrameInfo) {
        let order = self.ordered_ids();
        trace!(
            registry = %self.instance_id,
            frame = frame.id,
            phase = phase.name(),
            entities = order.len(),
            "pass start"
        );
        for id in order {
            // An earlier hook in this frame may have deactivated it.
            if self.is_active(id) {
                self.invoke(id, phase, frame);
            }
        }
    }

    /// Run `on_remove` for and purge every entity in `batch`.
    fn flush_removals(&mut self, batch: BTreeSet<EntityId>, frame: FrameInfo) -> usize {
        let mut purged = 0;
        for id in batch {
            let Some(record) = self.records.get(&id) else {
                continue;
            };
            // Re-enqueued earlier in this tick.
            if record.membership != Membership::PendingRemove {
                continue;
            }
            if record.started {
                self.invoke(id, Phase::OnRemove, frame);
                if self.membership(id) != Some(Membership::PendingRemove) {
                    continue;
                }
            }
            self.purge(id);
            purged += 1;
        }
        purged
    }

    /// Start and index every entity in `batch`.
    fn flush_additions(&mut self, batch: BTreeSet<EntityId>, frame: FrameInfo) -> usize {
        let mut started = 0;
        for id in batch {
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            // Removed earlier in this tick.
            if record.membership != Membership::PendingAdd {
                continue;
            }
            record.started = true;
            // May have been removed and re-enqueued by an earlier hook.
            self.pending_add.remove(&id);

            self.invoke(id, Phase::Start, frame);

            match self.membership(id) {
                Some(Membership::PendingAdd) => {
                    self.pending_add.remove(&id);
                    if let Some(record) = self.records.get_mut(&id) {
                        record.membership = Membership::Live;
                    }
                }
                // Removed during its own `start`: indexed now, purged next flush.
                Some(Membership::Live | Membership::PendingRemove) => {}
                Some(Membership::Detached) | None => continue,
            }
            self.index(id);
            started += 1;
        }
        started
    }

    fn index(&mut self, id: EntityId) {
        let Some(record) = self.records.get(&id) else {
            return;
        };
        let previous = self.live.insert(id, record.tag);
        assert!(previous.is_none(), "{id} indexed twice");
        self.by_type.entry(record.tag).or_default().insert(id);
        self.depth_index.insert(id, record.depth);
        trace!(registry = %self.instance_id, entity = %id, depth = %record.depth, "entity live");
    }

    fn purge(&mut self, id: EntityId) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        if let Some(tag) = self.live.remove(&id) {
            if let Some(ids) = self.by_type.get_mut(&tag) {
                ids.remove(&id);
            }
            self.depth_index.remove(id, record.depth);
        }
        // Removed again by a hook earlier in the same flush.
        self.pending_remove.remove(&id);
        record.membership = Membership::Detached;
        record.started = false;
        if record.destroyed {
            self.records.remove(&id);
        }
        trace!(registry = %self.instance_id, entity = %id, "entity purged");
    }

    /// Fail fast if the queues disagree with the records.
    fn check_queues(&self) {
        for id in &self.pending_add {
            assert!(
                !self.pending_remove.contains(id),
                "{id} is pending both addition and removal"
            );
            assert_eq!(
                self.membership(*id),
                Some(Membership::PendingAdd),
                "{id} queued for addition in the wrong state"
            );
        }
        for id in &self.pending_remove {
            assert_eq!(
                self.membership(*id),
                Some(Membership::PendingRemove),
                "{id} queued for removal in the wrong state"
            );
        }
    }

    /// Run one hook of `id` with the behaviour checked out of its record.
    fn invoke(&mut self, id: EntityId, phase: Phase, frame: FrameInfo) {
        let Some(mut behaviour) = self
            .records
            .get_mut(&id)
            .and_then(|record| record.behaviour.take())
        else {
            return;
        };

        {
            let mut ctx = HookContext::new(self, id, frame);
            phase.dispatch(&mut *behaviour, &mut ctx);
        }

        // The record is gone if the hook reset the registry.
        if let Some(record) = self.records.get_mut(&id) {
            record.behaviour = Some(behaviour);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("instance_id", &self.instance_id)
            .field("entities", &self.records.len())
            .field("live", &self.live.len())
            .field("pending_add", &self.pending_add)
            .field("pending_remove", &self.pending_remove)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every hook call as `"<name>:<hook>"`.
    struct Recorder {
        name: &'static str,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Rc::clone(log),
            }
        }

        fn push(&self, hook: &str) {
            self.log.borrow_mut().push(format!("{}:{hook}", self.name));
        }
    }

    impl Behaviour for Recorder {
        fn start(&mut self, _ctx: &mut HookContext<'_>) {
            self.push("start");
        }
        fn update(&mut self, _ctx: &mut HookContext<'_>) {
            self.push("update");
        }
        fn render(&mut self, _ctx: &mut HookContext<'_>) {
            self.push("render");
        }
        fn on_remove(&mut self, _ctx: &mut HookContext<'_>) {
            self.push("on_remove");
        }
    }

    struct Plain;
    impl Behaviour for Plain {}

    fn frame(id: u64) -> FrameInfo {
        FrameInfo::new(id, 1.0 / 60.0)
    }

    fn entries(log: &Log, hook: &str) -> Vec<String> {
        log.borrow()
            .iter()
            .filter(|line| line.ends_with(hook))
            .cloned()
            .collect()
    }

    #[test]
    fn test_create_is_detached() {
        let mut registry = Registry::new();
        let id = registry.create(Plain);
        assert_eq!(registry.membership(id), Some(Membership::Detached));
        registry.tick(frame(1));
        assert!(!registry.contains(id));
        assert!(registry.is_active(id));
        assert!(registry.is_visible(id));
    }

    #[test]
    fn test_enqueue_goes_live_at_next_tick() {
        let log = Log::default();
        let mut registry = Registry::new();
        let id = registry.create(Recorder::new("a", &log));
        assert_eq!(registry.enqueue(id), Ok(id));
        assert!(registry.is_pending_add(id));
        assert!(!registry.contains(id));

        registry.tick(frame(1));
        assert!(registry.contains(id));
        assert_eq!(registry.membership(id), Some(Membership::Live));
        assert_eq!(*log.borrow(), vec!["a:start", "a:update"]);
    }

    #[test]
    fn test_enqueue_unknown_entity() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.enqueue(EntityId(99)),
            Err(EntityError::UnknownEntity(EntityId(99)))
        );
    }

    #[test]
    fn test_enqueue_twice_starts_once() {
        let log = Log::default();
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        registry.enqueue(id).unwrap();
        registry.tick(frame(1));
        registry.enqueue(id).unwrap();
        registry.tick(frame(2));
        assert_eq!(entries(&log, "start").len(), 1);
    }

    #[test]
    fn test_destroy_runs_on_remove_next_tick() {
        let log = Log::default();
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        registry.tick(frame(1));

        assert!(registry.destroy(id));
        assert!(registry.is_destroyed(id));
        assert!(registry.is_pending_remove(id));
        assert!(registry.contains(id));
        assert!(entries(&log, "on_remove").is_empty());

        registry.tick(frame(2));
        assert!(!registry.contains(id));
        assert_eq!(registry.membership(id), None);
        assert!(registry.is_destroyed(id));
        assert_eq!(entries(&log, "on_remove"), vec!["a:on_remove"]);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let log = Log::default();
        let fired = Rc::new(RefCell::new(0));
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        let counter = Rc::clone(&fired);
        registry
            .add_destroy_trigger(id, move |_, _| *counter.borrow_mut() += 1)
            .unwrap();
        registry.tick(frame(1));

        assert!(registry.destroy(id));
        assert!(!registry.destroy(id));
        registry.tick(frame(2));
        assert!(!registry.destroy(id));
        registry.tick(frame(3));

        assert_eq!(*fired.borrow(), 1);
        assert_eq!(entries(&log, "on_remove").len(), 1);
    }

    #[test]
    fn test_triggers_fire_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        let id = registry.spawn(Plain);
        for n in 0..3 {
            let order = Rc::clone(&order);
            registry
                .add_destroy_trigger(id, move |_, fired_for| {
                    order.borrow_mut().push((n, fired_for));
                })
                .unwrap();
        }
        registry.destroy(id);
        assert_eq!(*order.borrow(), vec![(0, id), (1, id), (2, id)]);
    }

    #[test]
    fn test_trigger_can_destroy_other_entities() {
        let mut registry = Registry::new();
        let parent = registry.spawn(Plain);
        let child = registry.spawn(Plain);
        registry
            .add_destroy_trigger(parent, move |registry, _| {
                registry.destroy(child);
            })
            .unwrap();
        registry.tick(frame(1));

        registry.destroy(parent);
        assert!(registry.is_destroyed(child));
        registry.tick(frame(2));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_destroy_before_activation_skips_both_hooks() {
        let log = Log::default();
        let fired = Rc::new(RefCell::new(false));
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        let flag = Rc::clone(&fired);
        registry
            .add_destroy_trigger(id, move |_, _| *flag.borrow_mut() = true)
            .unwrap();

        assert!(registry.destroy(id));
        assert!(!registry.is_pending_add(id));
        assert!(registry.is_pending_remove(id));

        registry.tick(frame(1));
        registry.tick(frame(2));
        assert!(log.borrow().is_empty());
        assert!(*fired.borrow());
        assert_eq!(registry.membership(id), None);
    }

    #[test]
    fn test_destroy_detached_entity_drops_it() {
        let mut registry = Registry::new();
        let id = registry.create(Plain);
        assert!(registry.destroy(id));
        assert_eq!(registry.membership(id), None);
        assert!(registry.is_destroyed(id));
        assert!(registry.enqueue(id).is_err());
    }

    #[test]
    fn test_reenqueue_cancels_pending_removal() {
        let log = Log::default();
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        registry.tick(frame(1));

        registry.remove(id);
        assert!(registry.is_pending_remove(id));
        registry.enqueue(id).unwrap();
        assert!(!registry.is_pending_remove(id));
        assert!(!registry.is_pending_add(id));
        assert_eq!(registry.membership(id), Some(Membership::Live));

        registry.tick(frame(2));
        assert!(registry.contains(id));
        assert!(entries(&log, "on_remove").is_empty());
        assert_eq!(entries(&log, "start").len(), 1);
    }

    /// Re-enqueues and removes `target` again from its own `on_remove`.
    struct Bouncer {
        target: EntityId,
    }

    impl Behaviour for Bouncer {
        fn on_remove(&mut self, ctx: &mut HookContext<'_>) {
            let registry = ctx.registry_mut();
            registry.enqueue(self.target).unwrap();
            registry.remove(self.target);
        }
    }

    #[test]
    fn test_removal_repeated_inside_flush_purges_once() {
        let log = Log::default();
        let mut registry = Registry::new();
        // Removal flushes run in id order: the bouncer first, then the target.
        let bouncer = registry.create(Bouncer {
            target: EntityId(2),
        });
        let target = registry.spawn(Recorder::new("t", &log));
        assert_eq!(target, EntityId(2));
        registry.enqueue(bouncer).unwrap();
        registry.tick(frame(1));

        registry.remove(bouncer);
        registry.remove(target);
        registry.tick(frame(2));

        assert_eq!(registry.membership(target), Some(Membership::Detached));
        assert_eq!(registry.pending_counts(), (0, 0));
        assert_eq!(entries(&log, "on_remove"), vec!["t:on_remove"]);
    }

    #[test]
    fn test_remove_then_reenqueue_after_purge_restarts() {
        let log = Log::default();
        let mut registry = Registry::new();
        let id = registry.spawn(Recorder::new("a", &log));
        registry.tick(frame(1));
        registry.remove(id);
        registry.tick(frame(2));
        assert_eq!(registry.membership(id), Some(Membership::Detached));
        assert!(!registry.is_destroyed(id));

        registry.enqueue(id).unwrap();
        registry.tick(frame(3));
        assert!(registry.contains(id));
        assert_eq!(entries(&log, "start").len(), 2);
        assert_eq!(entries(&log, "on_remove").len(), 1);
    }

    #[test]
    fn test_remove_unknown_or_detached_is_noop() {
        let mut registry = Registry::new();
        registry.remove(EntityId(42));
        let id = registry.create(Plain);
        registry.remove(id);
        assert_eq!(registry.pending_counts(), (0, 0));
        assert_eq!(registry.membership(id), Some(Membership::Detached));
    }

    #[test]
    fn test_set_depth_rejects_non_finite() {
        let mut registry = Registry::new();
        let id = registry.spawn(Plain);
        assert_eq!(
            registry.set_depth(id, f64::NAN).map_err(|e| matches!(e, EntityError::InvalidValue(_))),
            Err(true)
        );
        assert_eq!(
            registry.set_depth(id, f64::INFINITY),
            Err(EntityError::InvalidValue(f64::INFINITY))
        );
        assert_eq!(registry.depth(id), Some(Depth::ZERO));
    }

    #[test]
    fn test_set_depth_unindexed_writes_field() {
        let mut registry = Registry::new();
        let id = registry.create(Plain);
        registry.set_depth(id, 3.0).unwrap();
        assert_eq!(registry.depth(id).map(Depth::get), Some(3.0));
        assert_eq!(
            registry.set_depth(EntityId(50), 1.0),
            Err(EntityError::UnknownEntity(EntityId(50)))
        );
    }

    #[test]
    fn test_render_order_by_depth_then_id() {
        let log = Log::default();
        let mut registry = Registry::new();
        let a = registry.spawn(Recorder::new("a", &log));
        let b = registry.spawn(Recorder::new("b", &log));
        let c = registry.spawn(Recorder::new("c", &log));
        registry.set_depth(a, 1.0).unwrap();
        registry.set_depth(b, 5.0).unwrap();
        registry.set_depth(c, 1.0).unwrap();

        registry.tick(frame(1));
        registry.render(frame(1));
        assert_eq!(entries(&log, "render"), vec!["b:render", "a:render", "c:render"]);
        assert_eq!(registry.ordered_ids(), vec![b, a, c]);
    }

    #[test]
    fn test_invisible_entities_skip_render() {
        let log = Log::default();
        let mut registry = Registry::new();
        let a = registry.spawn(Recorder::new("a", &log));
        registry.spawn(Recorder::new("b", &log));
        registry.set_visible(a, false).unwrap();
        registry.tick(frame(1));
        registry.render(frame(1));
        assert_eq!(entries(&log, "render"), vec!["b:render"]);
        assert!(!registry.is_visible(a));
    }

    #[test]
    fn test_inactive_entities_skip_updates() {
        let log = Log::default();
        let mut registry = Registry::new();
        let a = registry.spawn(Recorder::new("a", &log));
        registry.set_active(a, false).unwrap();
        registry.tick(frame(1));
        registry.render(frame(1));
        assert_eq!(*log.borrow(), vec!["a:start", "a:render"]);
    }

    #[test]
    fn test_type_index() {
        let log = Log::default();
        let mut registry = Registry::new();
        let p1 = registry.spawn(Recorder::new("a", &log));
        let plain = registry.spawn(Plain);
        let p2 = registry.spawn(Recorder::new("b", &log));

        assert_eq!(registry.entities_of::<Recorder>().count(), 0);
        registry.tick(frame(1));
        assert_eq!(registry.entities_of::<Recorder>().collect::<Vec<_>>(), vec![p1, p2]);
        assert_eq!(registry.entities_of::<Plain>().collect::<Vec<_>>(), vec![plain]);
        assert_eq!(registry.count_of::<Recorder>(), 2);
        assert_eq!(registry.tag_of::<Recorder>(), Some(TypeTag(0)));
        assert_eq!(registry.tag_of::<Plain>(), Some(TypeTag(1)));
        assert_eq!(registry.tag(plain), Some(TypeTag(1)));

        registry.destroy(p1);
        registry.tick(frame(2));
        assert_eq!(registry.entities_of::<Recorder>().collect::<Vec<_>>(), vec![p2]);
    }

    #[test]
    fn test_unknown_type_lookup_is_empty() {
        struct NeverSpawned;
        impl Behaviour for NeverSpawned {}

        let registry = Registry::new();
        assert_eq!(registry.entities_of::<NeverSpawned>().count(), 0);
        assert_eq!(registry.entities_with_tag(TypeTag(12)).count(), 0);
        assert_eq!(registry.count_of::<NeverSpawned>(), 0);
    }

    #[test]
    fn test_get_downcasts_behaviour() {
        let mut registry = Registry::new();
        let id = registry.spawn(Plain);
        assert!(registry.get::<Plain>(id).is_some());
        assert!(registry.get::<Recorder>(id).is_none());
        assert!(registry.get_mut::<Plain>(id).is_some());
        assert!(registry.get::<Plain>(EntityId(77)).is_none());
    }

    #[test]
    fn test_reset_clears_everything_but_keeps_ids_unique() {
        let mut registry = Registry::new();
        let first = registry.spawn(Plain);
        registry.tick(frame(1));
        registry.spawn(Plain);
        registry.reset();

        assert!(registry.is_idle());
        assert_eq!(registry.pending_counts(), (0, 0));
        assert_eq!(registry.membership(first), None);

        let next = registry.spawn(Plain);
        assert!(next > first);
        assert_eq!(next, EntityId(3));
    }

    #[test]
    fn test_reset_does_not_mark_entities_destroyed() {
        let mut registry = Registry::new();
        let gone = registry.spawn(Plain);
        let kept = registry.spawn(Plain);
        let detached = registry.create(Plain);
        registry.tick(frame(1));
        registry.destroy(gone);
        registry.tick(frame(2));
        assert_eq!(registry.membership(gone), None);

        let doomed = registry.spawn(Plain);
        registry.destroy(doomed);
        registry.reset();

        assert!(registry.is_destroyed(gone));
        assert!(registry.is_destroyed(doomed));
        assert!(!registry.is_destroyed(kept));
        assert!(!registry.is_destroyed(detached));
    }

    #[test]
    fn test_is_destroyed_unissued_ids() {
        let mut registry = Registry::new();
        registry.spawn(Plain);
        assert!(!registry.is_destroyed(EntityId(0)));
        assert!(!registry.is_destroyed(EntityId(2)));
    }

    #[test]
    fn test_independent_registries() {
        let mut one = Registry::new();
        let mut two = Registry::new();
        one.spawn(Plain);
        one.tick(frame(1));
        two.tick(frame(1));
        assert_eq!(one.len(), 1);
        assert!(two.is_empty());
        assert_ne!(one.instance_id(), two.instance_id());
    }
}
