//! # Entity Bag
//!
//! Unordered set of entity ids with O(1) insert, lookup and swap-remove.
//!
//! Implemented as a sparse set: `dense` holds the members contiguously for
//! iteration, `sparse` maps an entity index to its position in `dense`.

use super::entity::EntityId;

const VACANT: u32 = u32::MAX;

/// Unordered, O(1)-removable set of [`EntityId`]s.
#[derive(Clone, Debug, Default)]
pub struct EntityBag {
    dense: Vec<EntityId>,
    sparse: Vec<u32>,
}

impl EntityBag {
    /// Creates an empty bag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
        }
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` if the bag has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    #[inline]
    fn position(&self, entity: EntityId) -> Option<usize> {
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == VACANT {
            return None;
        }
        let position = slot as usize;
        (self.dense[position] == entity).then_some(position)
    }

    /// Checks membership. Generation must match.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.position(entity).is_some()
    }

    /// Inserts `entity`, returning `true` if it was not already a member.
    ///
    /// An older generation at the same index is replaced.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, entity: EntityId) -> bool {
        let index = entity.index() as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, VACANT);
        }

        let slot = self.sparse[index];
        if slot != VACANT {
            let existing = &mut self.dense[slot as usize];
            if *existing == entity {
                return false;
            }
            *existing = entity;
            return true;
        }

        self.sparse[index] = self.dense.len() as u32;
        self.dense.push(entity);
        true
    }

    /// Removes `entity`, returning `true` if it was a member.
    ///
    /// The last member is moved into the vacated position.
    #[allow(clippy::cast_possible_truncation)]
    pub fn remove(&mut self, entity: EntityId) -> bool {
        let Some(position) = self.position(entity) else {
            return false;
        };

        self.dense.swap_remove(position);
        self.sparse[entity.index() as usize] = VACANT;
        if let Some(moved) = self.dense.get(position) {
            self.sparse[moved.index() as usize] = position as u32;
        }
        true
    }

    /// Members as a slice, in no particular order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.dense
    }

    /// Iterates over members.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.dense.iter().copied()
    }

    /// Removes every member.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.sparse.clear();
    }
}

impl Extend<EntityId> for EntityBag {
    fn extend<I: IntoIterator<Item = EntityId>>(&mut self, iter: I) {
        for entity in iter {
            self.insert(entity);
        }
    }
}

impl<'a> IntoIterator for &'a EntityBag {
    type Item = &'a EntityId;
    type IntoIter = std::slice::Iter<'a, EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.dense.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut bag = EntityBag::new();
        let a = EntityId::new(3, 0);

        assert!(bag.insert(a));
        assert!(!bag.insert(a));
        assert!(bag.contains(a));
        assert!(!bag.contains(EntityId::new(3, 1)));
        assert!(!bag.contains(EntityId::new(100, 0)));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_positions_consistent() {
        let mut bag = EntityBag::new();
        let ids: Vec<_> = (0..5).map(|i| EntityId::new(i, 0)).collect();
        bag.extend(ids.iter().copied());

        assert!(bag.remove(ids[1]));
        assert!(!bag.remove(ids[1]));
        assert_eq!(bag.len(), 4);

        for id in [ids[0], ids[2], ids[3], ids[4]] {
            assert!(bag.contains(id));
        }
        assert!(bag.remove(ids[4]));
        assert!(bag.remove(ids[0]));
        assert_eq!(bag.len(), 2);
        assert!(bag.contains(ids[2]) && bag.contains(ids[3]));
    }

    #[test]
    fn test_newer_generation_replaces_older() {
        let mut bag = EntityBag::new();
        let old = EntityId::new(7, 0);
        let new = EntityId::new(7, 1);

        bag.insert(old);
        assert!(bag.insert(new));
        assert!(!bag.contains(old));
        assert!(bag.contains(new));
        assert_eq!(bag.len(), 1);
        assert!(!bag.remove(old));
    }

    #[test]
    fn test_clear() {
        let mut bag = EntityBag::new();
        bag.insert(EntityId::new(0, 0));
        bag.clear();
        assert!(bag.is_empty());
        assert!(!bag.contains(EntityId::new(0, 0)));
    }
}
