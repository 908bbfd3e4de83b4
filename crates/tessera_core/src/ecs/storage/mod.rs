//! # Component Storage
//!
//! Each registered component type gets exactly one storage, picked at
//! registration time:
//!
//! - [`DenseStorage`]: hash-indexed, packed values. Good for rare or optional
//!   components; makes no assumption about entity index density.
//! - [`SparseStorage`]: indexed directly by entity index. Guaranteed O(1) and
//!   cache-friendly for near-universal components (transform, velocity).
//!
//! Systems only ever see [`ComponentStorage`], which dispatches to the chosen
//! backend without revealing which one it is.
//!
//! Every backend keeps a change journal of entities whose component presence
//! changed. The scene folds the journal into entity component bits at flush,
//! so attaching a component directly through a storage is picked up by
//! subscriptions exactly like a queued command.

mod dense;
mod registry;
mod sparse;

use std::any::{type_name, Any};

use serde::{Deserialize, Serialize};

pub use dense::DenseStorage;
pub use registry::StorageRegistry;
pub use sparse::SparseStorage;

use super::bag::EntityBag;
use super::component::Component;
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// Which backend a component type is stored in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// [`DenseStorage`].
    Dense,
    /// [`SparseStorage`].
    #[default]
    Sparse,
}

/// Storage for one component type, backed by either backend.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ComponentStorage, EntityId};
///
/// let id = EntityId::new(0, 0);
/// for mut storage in [ComponentStorage::<u32>::dense(), ComponentStorage::sparse()] {
///     storage.add_component(id, Some(7));
///     assert_eq!(storage.get_component(id), Some(&7));
///     assert!(storage.remove_component(id));
///     assert_eq!(storage.get_component(id), None);
/// }
/// ```
#[derive(Clone, Debug)]
pub enum ComponentStorage<T> {
    /// Hash-indexed backend.
    Dense(DenseStorage<T>),
    /// Index-addressed backend.
    Sparse(SparseStorage<T>),
}

impl<T> ComponentStorage<T> {
    /// Creates an empty dense storage.
    #[must_use]
    pub fn dense() -> Self {
        Self::Dense(DenseStorage::new())
    }

    /// Creates an empty sparse storage.
    #[must_use]
    pub fn sparse() -> Self {
        Self::Sparse(SparseStorage::new())
    }

    /// Creates an empty storage of the given kind.
    #[must_use]
    pub fn with_kind(kind: StorageKind, capacity: usize) -> Self {
        match kind {
            StorageKind::Dense => Self::Dense(DenseStorage::with_capacity(capacity)),
            StorageKind::Sparse => Self::Sparse(SparseStorage::with_capacity(capacity)),
        }
    }

    /// Which backend this storage uses.
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Dense(_) => StorageKind::Dense,
            Self::Sparse(_) => StorageKind::Sparse,
        }
    }

    /// Returns the component of `entity`, or `None` if it has none.
    #[inline]
    #[must_use]
    pub fn get_component(&self, entity: EntityId) -> Option<&T> {
        match self {
            Self::Dense(storage) => storage.get(entity),
            Self::Sparse(storage) => storage.get(entity),
        }
    }

    /// Returns the component of `entity` mutably, or `None` if it has none.
    #[inline]
    pub fn get_component_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        match self {
            Self::Dense(storage) => storage.get_mut(entity),
            Self::Sparse(storage) => storage.get_mut(entity),
        }
    }

    /// Removes the component of `entity`. Returns `false` if it had none.
    pub fn remove_component(&mut self, entity: EntityId) -> bool {
        self.take_component(entity).is_some()
    }

    /// Removes and returns the component of `entity`.
    pub fn take_component(&mut self, entity: EntityId) -> Option<T> {
        match self {
            Self::Dense(storage) => storage.remove(entity),
            Self::Sparse(storage) => storage.remove(entity),
        }
    }

    /// Stores `value` for `entity`, overwriting any existing component.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        match self {
            Self::Dense(storage) => storage.insert(entity, value),
            Self::Sparse(storage) => storage.insert(entity, value),
        }
    }

    /// Checks whether `entity` has a component here.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        match self {
            Self::Dense(storage) => storage.contains(entity),
            Self::Sparse(storage) => storage.contains(entity),
        }
    }

    /// Number of stored components.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dense(storage) => storage.len(),
            Self::Sparse(storage) => storage.len(),
        }
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(entity, component)` pairs.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (EntityId, &T)> + '_> {
        match self {
            Self::Dense(storage) => Box::new(storage.iter()),
            Self::Sparse(storage) => Box::new(storage.iter()),
        }
    }

    /// Iterates mutably over `(entity, component)` pairs.
    pub fn iter_mut(&mut self) -> Box<dyn Iterator<Item = (EntityId, &mut T)> + '_> {
        match self {
            Self::Dense(storage) => Box::new(storage.iter_mut()),
            Self::Sparse(storage) => Box::new(storage.iter_mut()),
        }
    }

    fn cull(&mut self, destroyed: &[EntityId]) {
        match self {
            Self::Dense(storage) => storage.cull(destroyed),
            Self::Sparse(storage) => storage.cull(destroyed),
        }
    }

    fn drain_changes(&mut self, out: &mut Vec<EntityId>) {
        match self {
            Self::Dense(storage) => storage.drain_changes(out),
            Self::Sparse(storage) => storage.drain_changes(out),
        }
    }

    /// Removes every component.
    pub fn clear(&mut self) {
        match self {
            Self::Dense(storage) => storage.clear(),
            Self::Sparse(storage) => storage.clear(),
        }
    }
}

impl<T: Default> ComponentStorage<T> {
    /// Attaches a component to `entity`, using `initial` or `T::default()`.
    ///
    /// Overwrites any existing component and returns the stored value.
    pub fn add_component(&mut self, entity: EntityId, initial: Option<T>) -> &mut T {
        self.insert(entity, initial.unwrap_or_default())
    }

    /// Returns the existing component of `entity` or creates one.
    pub fn get_or_create_component(&mut self, entity: EntityId, initial: Option<T>) -> &mut T {
        let create = move || initial.unwrap_or_default();
        match self {
            Self::Dense(storage) => storage.get_or_insert_with(entity, create),
            Self::Sparse(storage) => storage.get_or_insert_with(entity, create),
        }
    }
}

impl<T: Send + Sync> ComponentStorage<T> {
    /// Runs `f` on the component of every member of `members`, in parallel.
    ///
    /// Members without a component here are skipped.
    ///
    /// # Errors
    ///
    /// Returns one of the errors produced by `f`.
    pub fn par_for_each_mut<F>(&mut self, members: &EntityBag, f: F) -> EcsResult<()>
    where
        F: Fn(EntityId, &mut T) -> EcsResult<()> + Send + Sync,
    {
        match self {
            Self::Dense(storage) => storage.par_for_each_mut(members, f),
            Self::Sparse(storage) => storage.par_for_each_mut(members, f),
        }
    }
}

/// Type-erased view of a [`ComponentStorage`], used by the scene to apply
/// queued commands and cull destroyed entities without knowing `T`.
pub(crate) trait ErasedStorage: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn contains_entity(&self, entity: EntityId) -> bool;
    fn insert_boxed(&mut self, entity: EntityId, value: Box<dyn Any + Send>) -> EcsResult<()>;
    fn remove_entity(&mut self, entity: EntityId) -> bool;
    fn cull(&mut self, destroyed: &[EntityId]);
    fn drain_changes(&mut self, out: &mut Vec<EntityId>);
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Component> ErasedStorage for ComponentStorage<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn contains_entity(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }

    fn insert_boxed(&mut self, entity: EntityId, value: Box<dyn Any + Send>) -> EcsResult<()> {
        let value = value
            .downcast::<T>()
            .map_err(|_| EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
            })?;
        self.insert(entity, *value);
        Ok(())
    }

    fn remove_entity(&mut self, entity: EntityId) -> bool {
        self.remove_component(entity)
    }

    fn cull(&mut self, destroyed: &[EntityId]) {
        ComponentStorage::cull(self, destroyed);
    }

    fn drain_changes(&mut self, out: &mut Vec<EntityId>) {
        ComponentStorage::drain_changes(self, out);
    }

    fn clear(&mut self) {
        ComponentStorage::clear(self);
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
