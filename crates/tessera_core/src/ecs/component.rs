//! # Component Types
//!
//! Components are plain data attached to entities. Every payload type is
//! assigned a small integer id by a [`TypeRegistry`], and that id doubles as
//! the component's bit in an entity's [`ComponentBits`].
//!
//! The registry is an explicit handle rather than global state: the engine
//! context owns one and threads it into masks, aspects and scenes, so id
//! assignment order is reproducible and testable.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{EcsError, EcsResult};

/// Maximum number of distinct component types a registry can hand out.
///
/// Component sets are stored as a single `u64` bitmask.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Default`: storages create default values on request
/// - `Send + Sync`: parallel systems read and write them from worker threads
/// - `'static`: identified by [`TypeId`]
///
/// # Example
///
/// ```rust
/// use tessera_core::Component;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Health(u32);
///
/// impl Component for Health {}
/// ```
pub trait Component: Default + Send + Sync + 'static {}

/// Integer id of a component payload type within one [`TypeRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(u8);

impl ComponentType {
    /// Returns the id assigned to `T`, assigning the next one on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponentTypes`] if the registry is full.
    #[inline]
    pub fn of<T: Component>(registry: &TypeRegistry) -> EcsResult<Self> {
        registry.id_of::<T>()
    }

    /// Builds a component type from a raw id.
    #[inline]
    #[must_use]
    pub(crate) const fn from_id(id: u8) -> Self {
        debug_assert!((id as usize) < MAX_COMPONENT_TYPES);
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Returns this type's bit in a [`ComponentBits`] mask.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1 << self.0
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A set of component types, one bit per [`ComponentType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentBits(u64);

impl ComponentBits {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Creates a set from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if the set contains a component type.
    #[inline]
    #[must_use]
    pub const fn contains(self, component: ComponentType) -> bool {
        self.0 & component.bit() != 0
    }

    /// Adds a component type to the set.
    #[inline]
    pub fn insert(&mut self, component: ComponentType) {
        self.0 |= component.bit();
    }

    /// Removes a component type from the set.
    #[inline]
    pub fn remove(&mut self, component: ComponentType) {
        self.0 &= !component.bit();
    }

    /// Returns a copy of the set with `component` added.
    #[inline]
    #[must_use]
    pub const fn with(self, component: ComponentType) -> Self {
        Self(self.0 | component.bit())
    }

    /// Returns `true` if the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every type in `other` is also in `self`.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the two sets share at least one type.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Number of types in the set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the types in the set, lowest id first.
    pub fn iter(self) -> impl Iterator<Item = ComponentType> {
        let mut remaining = self.0;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            #[allow(clippy::cast_possible_truncation)]
            let id = remaining.trailing_zeros() as u8;
            remaining &= remaining - 1;
            Some(ComponentType(id))
        })
    }
}

impl FromIterator<ComponentType> for ComponentBits {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        let mut bits = Self::EMPTY;
        for component in iter {
            bits.insert(component);
        }
        bits
    }
}

#[derive(Default)]
struct RegistryInner {
    ids: HashMap<TypeId, ComponentType>,
    names: Vec<&'static str>,
}

/// Assigns sequential [`ComponentType`] ids to component payload types.
///
/// Cloning the handle shares the underlying table, so every clone agrees on
/// ids. Two independently created registries never share ids.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `T`, assigning the next sequential id on first call.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponentTypes`] once
    /// [`MAX_COMPONENT_TYPES`] types have been assigned.
    pub fn id_of<T: Component>(&self) -> EcsResult<ComponentType> {
        let key = TypeId::of::<T>();
        if let Some(&id) = self.inner.read().ids.get(&key) {
            return Ok(id);
        }

        let mut inner = self.inner.write();
        // Another handle may have assigned it between the two locks.
        if let Some(&id) = inner.ids.get(&key) {
            return Ok(id);
        }

        let next = inner.names.len();
        if next >= MAX_COMPONENT_TYPES {
            return Err(EcsError::TooManyComponentTypes {
                limit: MAX_COMPONENT_TYPES,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let id = ComponentType(next as u8);
        inner.ids.insert(key, id);
        inner.names.push(type_name::<T>());
        debug!(component = type_name::<T>(), id = id.0, "Assigned component type id");
        Ok(id)
    }

    /// Looks up the id of `T` without assigning one.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<ComponentType> {
        self.inner.read().ids.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the Rust type name registered under `component`.
    #[must_use]
    pub fn name(&self, component: ComponentType) -> Option<&'static str> {
        self.inner.read().names.get(component.0 as usize).copied()
    }

    /// Number of types assigned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    /// Returns `true` if no type has been assigned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().names.iter()).finish()
    }
}

/// A tuple of component types, used to build aspects in one call.
///
/// Implemented for tuples of one to eight [`Component`]s.
pub trait ComponentSet {
    /// Resolves every member type and returns the combined bits.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::TooManyComponentTypes`] if a member cannot be
    /// assigned an id.
    fn bits(registry: &TypeRegistry) -> EcsResult<ComponentBits>;
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn bits(registry: &TypeRegistry) -> EcsResult<ComponentBits> {
                let mut bits = ComponentBits::EMPTY;
                $(bits.insert(registry.id_of::<$name>()?);)+
                Ok(bits)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Position;
    impl Component for Position {}

    #[derive(Default)]
    struct Velocity;
    impl Component for Velocity {}

    #[derive(Default)]
    struct Sprite;
    impl Component for Sprite {}

    #[test]
    fn test_ids_are_sequential_and_cached() {
        let registry = TypeRegistry::new();
        let position = ComponentType::of::<Position>(&registry).unwrap();
        let velocity = ComponentType::of::<Velocity>(&registry).unwrap();

        assert_eq!(position.id(), 0);
        assert_eq!(velocity.id(), 1);
        assert_eq!(registry.id_of::<Position>().unwrap(), position);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clones_share_ids_but_registries_do_not() {
        let a = TypeRegistry::new();
        let shared = a.clone();
        let b = TypeRegistry::new();

        a.id_of::<Position>().unwrap();
        assert_eq!(shared.id_of::<Velocity>().unwrap().id(), 1);
        assert_eq!(b.id_of::<Velocity>().unwrap().id(), 0);
        assert_eq!(a.get::<Velocity>(), Some(ComponentType(1)));
        assert_eq!(b.get::<Position>(), None);
    }

    #[test]
    fn test_names_are_recorded() {
        let registry = TypeRegistry::new();
        let sprite = registry.id_of::<Sprite>().unwrap();
        assert!(registry.name(sprite).unwrap().ends_with("Sprite"));
        assert_eq!(registry.name(ComponentType(40)), None);
    }

    #[test]
    fn test_bits_operations() {
        let a = ComponentType(0);
        let b = ComponentType(3);
        let c = ComponentType(63);

        let mut bits = ComponentBits::EMPTY;
        bits.insert(a);
        bits.insert(c);
        assert!(bits.contains(a));
        assert!(!bits.contains(b));
        assert!(bits.contains(c));
        assert_eq!(bits.count(), 2);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![a, c]);

        assert!(bits.contains_all(ComponentBits::EMPTY.with(a)));
        assert!(!bits.contains_all(ComponentBits::EMPTY.with(b)));
        assert!(bits.intersects(ComponentBits::EMPTY.with(c).with(b)));

        bits.remove(a);
        assert_eq!(bits, ComponentBits::from_raw(1 << 63));
    }

    #[test]
    fn test_component_set_bits() {
        let registry = TypeRegistry::new();
        let bits = <(Position, Sprite)>::bits(&registry).unwrap();

        assert_eq!(bits.count(), 2);
        assert!(bits.contains(registry.get::<Position>().unwrap()));
        assert!(bits.contains(registry.get::<Sprite>().unwrap()));
        assert_eq!(registry.get::<Velocity>(), None);
    }

    #[test]
    fn test_registry_limit() {
        #[derive(Default)]
        struct Filler<const N: usize>;
        impl<const N: usize> Component for Filler<N> {}

        let registry = TypeRegistry::new();
        macro_rules! fill {
            ($($n:literal)*) => {
                $(registry.id_of::<Filler<$n>>().unwrap();)*
            };
        }

        fill!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
              32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53 54 55 56 57 58 59 60 61 62 63);
        assert_eq!(registry.len(), MAX_COMPONENT_TYPES);
        assert_eq!(
            registry.id_of::<Position>(),
            Err(EcsError::TooManyComponentTypes {
                limit: MAX_COMPONENT_TYPES
            })
        );
    }
}
