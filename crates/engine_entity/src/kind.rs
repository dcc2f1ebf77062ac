//! Per-kind type tags.
//!
//! Every concrete entity type gets a [`TypeTag`] the first time a registry
//! sees it. Tags are dense indices in first-seen order, so they double as
//! keys into the registry's type index.

use std::any::TypeId;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Dense first-seen index of a concrete entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeTag(pub u32);

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeTag({})", self.0)
    }
}

/// Maps Rust types to [`TypeTag`]s in registration order.
#[derive(Debug, Default)]
pub struct KindTable {
    tags: HashMap<TypeId, TypeTag>,
    /// `names[tag.0]` is the type name recorded at registration.
    names: Vec<&'static str>,
}

impl KindTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tag for `T`, assigning the next index if `T` is new.
    pub fn register<T: 'static>(&mut self) -> TypeTag {
        let names = &mut self.names;
        *self.tags.entry(TypeId::of::<T>()).or_insert_with(|| {
            let tag = TypeTag(names.len() as u32);
            names.push(std::any::type_name::<T>());
            tag
        })
    }

    /// Returns the tag for `T` without registering it.
    #[must_use]
    pub fn get<T: 'static>(&self) -> Option<TypeTag> {
        self.tags.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the type name recorded for `tag`.
    #[must_use]
    pub fn name(&self, tag: TypeTag) -> Option<&'static str> {
        self.names.get(tag.0 as usize).copied()
    }

    /// Number of distinct kinds seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no kind has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
