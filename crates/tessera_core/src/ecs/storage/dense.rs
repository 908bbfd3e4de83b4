//! Hash-indexed storage for rare or optional components.
//!
//! Values live in a contiguous vector; a hash map from [`EntityId`] to vector
//! position gives O(1) average lookup without assuming entity indices are
//! dense. Removal swaps the last value into the hole.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::ecs::bag::EntityBag;
use crate::ecs::entity::EntityId;
use crate::error::EcsResult;

/// Dense, hash-indexed component storage.
#[derive(Clone, Debug)]
pub struct DenseStorage<T> {
    /// Entity to position in `values`.
    indices: HashMap<EntityId, usize>,
    /// Component values, packed.
    values: Vec<T>,
    /// Owner of each value, parallel to `values`.
    owners: Vec<EntityId>,
    /// Entities whose presence changed since the last drain.
    changes: Vec<EntityId>,
}

impl<T> DenseStorage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty storage with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            indices: HashMap::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            changes: Vec::new(),
        }
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Checks whether `entity` has a value.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.indices.contains_key(&entity)
    }

    /// Returns the value of `entity`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.indices.get(&entity).map(|&position| &self.values[position])
    }

    /// Returns the value of `entity` mutably, if any.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let position = *self.indices.get(&entity)?;
        self.values.get_mut(position)
    }

    /// Stores `value` for `entity`, overwriting any existing value.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        if let Some(&position) = self.indices.get(&entity) {
            self.values[position] = value;
            return &mut self.values[position];
        }

        let position = self.values.len();
        self.indices.insert(entity, position);
        self.values.push(value);
        self.owners.push(entity);
        self.changes.push(entity);
        &mut self.values[position]
    }

    /// Returns the existing value or inserts the result of `create`.
    pub fn get_or_insert_with(&mut self, entity: EntityId, create: impl FnOnce() -> T) -> &mut T {
        if let Some(&position) = self.indices.get(&entity) {
            return &mut self.values[position];
        }
        self.insert(entity, create())
    }

    /// Removes and returns the value of `entity`.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let value = self.detach(entity)?;
        self.changes.push(entity);
        Some(value)
    }

    fn detach(&mut self, entity: EntityId) -> Option<T> {
        let position = self.indices.remove(&entity)?;
        let value = self.values.swap_remove(position);
        self.owners.swap_remove(position);
        if let Some(&moved) = self.owners.get(position) {
            self.indices.insert(moved, position);
        }
        Some(value)
    }

    /// Drops the values of destroyed entities without journaling them.
    pub fn cull(&mut self, destroyed: &[EntityId]) {
        for &entity in destroyed {
            self.detach(entity);
        }
    }

    /// Moves the change journal into `out`.
    pub fn drain_changes(&mut self, out: &mut Vec<EntityId>) {
        out.append(&mut self.changes);
    }

    /// Iterates over `(entity, value)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.owners.iter().copied().zip(self.values.iter())
    }

    /// Iterates mutably over `(entity, value)` pairs in storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.owners.iter().copied().zip(self.values.iter_mut())
    }

    /// Removes every value. The removals are journaled.
    pub fn clear(&mut self) {
        self.changes.append(&mut self.owners);
        self.indices.clear();
        self.values.clear();
    }
}

impl<T: Send + Sync> DenseStorage<T> {
    /// Runs `f` on the value of every member of `members`, in parallel.
    ///
    /// # Errors
    ///
    /// Returns one of the errors produced by `f`; the pass stops early.
    pub fn par_for_each_mut<F>(&mut self, members: &EntityBag, f: F) -> EcsResult<()>
    where
        F: Fn(EntityId, &mut T) -> EcsResult<()> + Send + Sync,
    {
        self.owners
            .par_iter()
            .zip(self.values.par_iter_mut())
            .filter(|(owner, _)| members.contains(**owner))
            .try_for_each(|(&owner, value)| f(owner, value))
    }
}

impl<T> Default for DenseStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
