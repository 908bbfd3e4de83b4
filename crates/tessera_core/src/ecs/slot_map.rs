//! # Slot Map
//!
//! A generational arena with stable, reusable keys.
//!
//! Each slot carries a generation counter. Removing a value frees the slot
//! and the next insertion that reuses it bumps the generation, so keys handed
//! out before the removal never resolve to the new value.
//!
//! Insertion, removal and access are all O(1).

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{EcsError, EcsResult};

/// A key type usable with [`SlotMap`].
///
/// Keys are plain `(index, generation)` pairs; the map never stores them.
pub trait Key: Copy + Eq + fmt::Debug {
    /// Builds a key from its parts.
    fn from_parts(index: u32, generation: u32) -> Self;
    /// Slot index of this key.
    fn index(self) -> u32;
    /// Generation this key was issued at.
    fn generation(self) -> u32;
}

/// A single slot: the stored value (if occupied) and its current generation.
#[derive(Clone, Debug)]
struct Slot<V> {
    value: Option<V>,
    generation: u32,
}

/// Generational arena handing out keys of type `K`.
///
/// # Example
///
/// ```rust
/// use tessera_core::{EntityId, SlotMap};
///
/// let mut map: SlotMap<EntityId, &str> = SlotMap::new();
/// let a = map.add("a");
/// assert!(map.remove(a));
///
/// let b = map.add("b");
/// assert_eq!(a.index(), b.index());
/// assert_eq!(map.try_get(a), None);
/// assert_eq!(map.try_get(b), Some(&"b"));
/// ```
pub struct SlotMap<K: Key, V> {
    /// All slots ever allocated.
    slots: Vec<Slot<V>>,
    /// Freed indices, reused oldest-first.
    free: VecDeque<u32>,
    /// Number of occupied slots.
    len: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: Key, V> SlotMap<K, V> {
    /// Creates an empty slot map.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty slot map with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: VecDeque::with_capacity(capacity),
            len: 0,
            _key: PhantomData,
        }
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no value is live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value and returns its key.
    ///
    /// Reuses the oldest freed slot if one exists, bumping its generation;
    /// otherwise appends a new slot at generation 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, value: V) -> K {
        self.len += 1;

        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return K::from_parts(index, slot.generation);
        }

        // Slot indices share the key's 32-bit index space.
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            value: Some(value),
            generation: 0,
        });
        K::from_parts(index, 0)
    }

    /// Looks up a value, returning `None` for stale or out-of-range keys.
    #[inline]
    #[must_use]
    pub fn try_get(&self, key: K) -> Option<&V> {
        let slot = self.slots.get(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable variant of [`SlotMap::try_get`].
    #[inline]
    pub fn try_get_mut(&mut self, key: K) -> Option<&mut V> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Looks up a value the caller has asserted is live.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSlot`] if the key is stale or out of range.
    pub fn get(&self, key: K) -> EcsResult<&V> {
        self.try_get(key).ok_or_else(|| invalid_slot(key))
    }

    /// Mutable variant of [`SlotMap::get`].
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidSlot`] if the key is stale or out of range.
    pub fn get_mut(&mut self, key: K) -> EcsResult<&mut V> {
        self.try_get_mut(key).ok_or_else(|| invalid_slot(key))
    }

    /// Checks whether the key still refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.try_get(key).is_some()
    }

    /// Removes the value behind `key`, dropping it.
    ///
    /// Returns `false` without side effects for stale or absent keys, so
    /// removing twice is harmless.
    pub fn remove(&mut self, key: K) -> bool {
        self.take(key).is_some()
    }

    /// Removes and returns the value behind `key`.
    pub fn take(&mut self, key: K) -> Option<V> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }

        let value = slot.value.take()?;
        self.free.push_back(key.index());
        self.len -= 1;
        Some(value)
    }

    /// Iterates over all live `(key, value)` pairs in slot order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (K::from_parts(index as u32, slot.generation), value))
        })
    }

    /// Iterates mutably over all live `(key, value)` pairs in slot order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (K::from_parts(index as u32, generation), value))
        })
    }

    /// Iterates over the keys of all live values.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Removes every value.
    ///
    /// Generations are kept, so keys issued before the clear stay stale.
    #[allow(clippy::cast_possible_truncation)]
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                self.free.push_back(index as u32);
            }
        }
        self.len = 0;
    }
}

impl<K: Key, V> Default for SlotMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, V: fmt::Debug> fmt::Debug for SlotMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn invalid_slot<K: Key>(key: K) -> EcsError {
    EcsError::InvalidSlot {
        index: key.index(),
        generation: key.generation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::EntityId;

    #[test]
    fn test_add_and_get() {
        let mut map: SlotMap<EntityId, u32> = SlotMap::new();
        let a = map.add(10);
        let b = map.add(20);

        assert_eq!(a, EntityId::new(0, 0));
        assert_eq!(b, EntityId::new(1, 0));
        assert_eq!(map.try_get(a), Some(&10));
        assert_eq!(map.get(b), Ok(&20));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_stale_handle_never_sees_new_value() {
        let mut map: SlotMap<EntityId, &str> = SlotMap::new();
        let old = map.add("old");
        assert!(map.remove(old));

        let new = map.add("new");
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), old.generation() + 1);
        assert_eq!(map.try_get(old), None);
        assert!(!map.contains(old));
        assert_eq!(map.try_get(new), Some(&"new"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut map: SlotMap<EntityId, u8> = SlotMap::new();
        let key = map.add(1);

        assert!(map.remove(key));
        assert!(!map.remove(key));
        assert!(map.is_empty());
    }

    #[test]
    fn test_forced_get_reports_invalid_slot() {
        let mut map: SlotMap<EntityId, u8> = SlotMap::new();
        let key = map.add(1);
        map.remove(key);

        assert_eq!(
            map.get(key),
            Err(EcsError::InvalidSlot {
                index: 0,
                generation: 0
            })
        );
        assert!(map.get(EntityId::new(99, 0)).is_err());
    }

    #[test]
    fn test_out_of_range_key() {
        let map: SlotMap<EntityId, u8> = SlotMap::new();
        assert_eq!(map.try_get(EntityId::new(5, 0)), None);
        assert!(!map.contains(EntityId::NULL));
    }

    #[test]
    fn test_churn_never_aliases_live_handles() {
        let mut map: SlotMap<EntityId, usize> = SlotMap::new();
        let mut live = Vec::new();

        for round in 0..50 {
            live.push(map.add(round));
            live.push(map.add(round + 1000));
            let victim = live.remove(0);
            assert!(map.remove(victim));
            assert_eq!(map.try_get(victim), None);
        }

        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                assert_ne!(a, b);
            }
            assert!(map.contains(*a));
        }
        assert_eq!(map.len(), live.len());
    }

    #[test]
    fn test_free_slots_reused_oldest_first() {
        let mut map: SlotMap<EntityId, u8> = SlotMap::new();
        let a = map.add(0);
        let b = map.add(1);
        map.remove(b);
        map.remove(a);

        assert_eq!(map.add(2).index(), b.index());
        assert_eq!(map.add(3).index(), a.index());
    }

    #[test]
    fn test_clear_keeps_generations() {
        let mut map: SlotMap<EntityId, u8> = SlotMap::new();
        let a = map.add(0);
        map.clear();

        assert!(map.is_empty());
        let b = map.add(1);
        assert_eq!(b.index(), a.index());
        assert!(!map.contains(a));
    }

    #[test]
    fn test_iter_yields_live_keys() {
        let mut map: SlotMap<EntityId, u8> = SlotMap::new();
        let a = map.add(1);
        let b = map.add(2);
        let c = map.add(3);
        map.remove(b);

        let keys: Vec<_> = map.keys().collect();
        assert_eq!(keys, vec![a, c]);

        for (_, value) in map.iter_mut() {
            *value *= 10;
        }
        assert_eq!(map.try_get(c), Some(&30));
    }
}
