//! Index-addressed storage for near-universal components.
//!
//! Values sit in a vector indexed directly by [`EntityId::index`], growing on
//! demand. Each slot remembers its owner so a stale id with the same index is
//! never mistaken for the live one.

use rayon::prelude::*;

use crate::ecs::bag::EntityBag;
use crate::ecs::entity::EntityId;
use crate::error::EcsResult;

#[derive(Clone, Debug)]
struct SparseSlot<T> {
    owner: EntityId,
    value: T,
}

/// Sparse, index-addressed component storage.
#[derive(Clone, Debug)]
pub struct SparseStorage<T> {
    slots: Vec<Option<SparseSlot<T>>>,
    len: usize,
    changes: Vec<EntityId>,
}

impl<T> SparseStorage<T> {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty storage with `capacity` slots reserved.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            len: 0,
            changes: Vec::new(),
        }
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn slot(&self, entity: EntityId) -> Option<&SparseSlot<T>> {
        self.slots
            .get(entity.index() as usize)?
            .as_ref()
            .filter(|slot| slot.owner == entity)
    }

    /// Checks whether `entity` has a value.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    /// Returns the value of `entity`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.slot(entity).map(|slot| &slot.value)
    }

    /// Returns the value of `entity` mutably, if any.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slots
            .get_mut(entity.index() as usize)?
            .as_mut()
            .filter(|slot| slot.owner == entity)
            .map(|slot| &mut slot.value)
    }

    /// Grows the slot vector to cover `entity` and returns its index.
    fn reserve(&mut self, entity: EntityId) -> usize {
        let index = entity.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        index
    }

    /// Stores `value` for `entity`, overwriting any existing value.
    pub fn insert(&mut self, entity: EntityId, value: T) -> &mut T {
        let index = self.reserve(entity);
        if !self.contains(entity) {
            if self.slots[index].is_none() {
                self.len += 1;
            }
            self.changes.push(entity);
        }
        &mut self.slots[index]
            .insert(SparseSlot {
                owner: entity,
                value,
            })
            .value
    }

    /// Returns the existing value or inserts the result of `create`.
    pub fn get_or_insert_with(&mut self, entity: EntityId, create: impl FnOnce() -> T) -> &mut T {
        let index = self.reserve(entity);
        if !self.contains(entity) {
            if self.slots[index].take().is_none() {
                self.len += 1;
            }
            self.changes.push(entity);
        }
        &mut self.slots[index]
            .get_or_insert_with(|| SparseSlot {
                owner: entity,
                value: create(),
            })
            .value
    }

    /// Removes and returns the value of `entity`.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let value = self.detach(entity)?;
        self.changes.push(entity);
        Some(value)
    }

    fn detach(&mut self, entity: EntityId) -> Option<T> {
        if !self.contains(entity) {
            return None;
        }
        let slot = self.slots[entity.index() as usize].take()?;
        self.len -= 1;
        Some(slot.value)
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

    /// Iterates over `(entity, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|slot| (slot.owner, &slot.value)))
    }

    /// Iterates mutably over `(entity, value)` pairs in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|slot| (slot.owner, &mut slot.value)))
    }

    /// Removes every value. The removals are journaled.
    pub fn clear(&mut self) {
        for slot in self.slots.drain(..).flatten() {
            self.changes.push(slot.owner);
        }
        self.len = 0;
    }
}

impl<T: Send + Sync> SparseStorage<T> {
    /// Runs `f` on the value of every member of `members`, in parallel.
    ///
    /// # Errors
    ///
    /// Returns one of the errors produced by `f`; the pass stops early.
    pub fn par_for_each_mut<F>(&mut self, members: &EntityBag, f: F) -> EcsResult<()>
    where
        F: Fn(EntityId, &mut T) -> EcsResult<()> + Send + Sync,
    {
        self.slots
            .par_iter_mut()
            .filter_map(Option::as_mut)
            .filter(|slot| members.contains(slot.owner))
            .try_for_each(|slot| f(slot.owner, &mut slot.value))
    }
}

impl<T> Default for SparseStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
