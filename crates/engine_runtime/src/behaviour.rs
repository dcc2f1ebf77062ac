//! Lifecycle hooks and the context handed to them.
//!
//! A [`Behaviour`] is the per-kind logic of an entity. Every hook has a
//! no-op default, so a behaviour only overrides what it needs. Hooks are
//! only ever called by the [`Registry`]; user code never calls them
//! directly.

use std::any::Any;

use engine_entity::{Depth, EntityError, EntityId};

use crate::registry::Registry;

/// Upcast helper so boxed behaviours can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-entity lifecycle hooks.
///
/// # Examples
///
/// ```rust
/// use engine_runtime::{Behaviour, HookContext, Registry, FrameInfo};
///
/// struct Countdown(u32);
///
/// impl Behaviour for Countdown {
///     fn update(&mut self, ctx: &mut HookContext<'_>) {
///         self.0 = self.0.saturating_sub(1);
///         if self.0 == 0 {
///             ctx.destroy_self();
///         }
///     }
/// }
///
/// let mut registry = Registry::new();
/// let id = registry.spawn(Countdown(1));
/// registry.tick(FrameInfo::new(1, 1.0 / 60.0));
/// assert!(registry.is_destroyed(id));
/// ```
#[allow(unused_variables)]
pub trait Behaviour: AsAny {
    /// Called once when the entity is promoted to the live set, before it is
    /// indexed. A depth set here is the depth the entity is indexed under.
    fn start(&mut self, ctx: &mut HookContext<'_>) {}

    /// First simulation pass of a frame.
    fn pre_update(&mut self, ctx: &mut HookContext<'_>) {}

    /// Main simulation pass of a frame.
    fn update(&mut self, ctx: &mut HookContext<'_>) {}

    /// Last simulation pass of a frame. Positions are final after this.
    fn post_update(&mut self, ctx: &mut HookContext<'_>) {}

    /// Called once per frame for visible entities.
    fn render(&mut self, ctx: &mut HookContext<'_>) {}

    /// Called once when the entity is purged from the live set.
    fn on_remove(&mut self, ctx: &mut HookContext<'_>) {}
}

impl dyn Behaviour {
    /// Downcast to the concrete behaviour type.
    #[must_use]
    pub fn downcast_ref<T: Behaviour>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    /// Mutable downcast to the concrete behaviour type.
    #[must_use]
    pub fn downcast_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        AsAny::as_any_mut(self).downcast_mut::<T>()
    }
}

/// The hook a registry is currently dispatching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    PreUpdate,
    Update,
    PostUpdate,
    Render,
    OnRemove,
}

impl Phase {
    /// The three simulation passes, in execution order.
    pub const PASSES: [Phase; 3] = [Phase::PreUpdate, Phase::Update, Phase::PostUpdate];

    pub(crate) fn dispatch(self, behaviour: &mut dyn Behaviour, ctx: &mut HookContext<'_>) {
        match self {
            Phase::Start => behaviour.start(ctx),
            Phase::PreUpdate => behaviour.pre_update(ctx),
            Phase::Update => behaviour.update(ctx),
            Phase::PostUpdate => behaviour.post_update(ctx),
            Phase::Render => behaviour.render(ctx),
            Phase::OnRemove => behaviour.on_remove(ctx),
        }
    }

    /// Short name used in log events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::PreUpdate => "pre_update",
            Phase::Update => "update",
            Phase::PostUpdate => "post_update",
            Phase::Render => "render",
            Phase::OnRemove => "on_remove",
        }
    }
}

/// Frame metadata passed to every hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Frame counter, starting at 1 for the first driven frame.
    pub id: u64,
    /// Seconds since the previous frame.
    pub dt: f64,
}

impl FrameInfo {
    #[must_use]
    pub const fn new(id: u64, dt: f64) -> Self {
        Self { id, dt }
    }
}

/// Context provided to a hook while it runs.
///
/// The running entity's behaviour is checked out of the registry for the
/// duration of the call, so [`Registry::get`] on the running entity returns
/// `None`. Everything else on the registry is available.
pub struct HookContext<'a> {
    registry: &'a mut Registry,
    entity: EntityId,
    frame: FrameInfo,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(registry: &'a mut Registry, entity: EntityId, frame: FrameInfo) -> Self {
        Self {
            registry,
            entity,
            frame,
        }
    }

    /// The entity whose hook is running.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// The current frame.
    #[must_use]
    pub fn frame(&self) -> FrameInfo {
        self.frame
    }

    /// Seconds since the previous frame.
    #[must_use]
    pub fn dt(&self) -> f64 {
        self.frame.dt
    }

    /// Shared access to the owning registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &*self.registry
    }

    /// Mutable access to the owning registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut *self.registry
    }

    /// Create and enqueue a new entity. It becomes live at the next tick.
    pub fn spawn<B: Behaviour>(&mut self, behaviour: B) -> EntityId {
        self.registry.spawn(behaviour)
    }

    /// Destroy the running entity. Returns `false` if it was already destroyed.
    pub fn destroy_self(&mut self) -> bool {
        self.registry.destroy(self.entity)
    }

    /// Current depth of the running entity.
    #[must_use]
    pub fn depth(&self) -> Depth {
        self.registry.depth(self.entity).unwrap_or_default()
    }

    /// Set the running entity's depth.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidValue`] for non-finite values.
    pub fn set_depth(&mut self, value: f64) -> Result<(), EntityError> {
        self.registry.set_depth(self.entity, value)
    }
}

impl std::fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("entity", &self.entity)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}
