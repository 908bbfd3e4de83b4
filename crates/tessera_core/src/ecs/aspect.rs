//! # Component Masks and Aspects
//!
//! A [`ComponentMask`] is a query: the component types an entity must have
//! (inclusions) and must not have (exclusions). An [`Aspect`] is the
//! immutable, hashable form of a mask that subscriptions are cached under.
//!
//! ## Matching rules
//!
//! Two questions can be asked of a mask:
//!
//! - [`ComponentMask::interested_in`] is a per-type test. Empty inclusions act
//!   as a wildcard, so an open mask is interested in every type it does not
//!   exclude.
//! - [`ComponentMask::matches`] is a whole-entity test: every inclusion present
//!   and no exclusion present.

use std::fmt;

use super::component::{Component, ComponentBits, ComponentSet, ComponentType, TypeRegistry};
use crate::error::EcsResult;

/// Inclusion and exclusion sets describing an entity query.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask {
    inclusions: ComponentBits,
    exclusions: ComponentBits,
}

impl ComponentMask {
    /// Creates an open mask that matches every entity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inclusions: ComponentBits::EMPTY,
            exclusions: ComponentBits::EMPTY,
        }
    }

    /// Requires `T` on matching entities.
    ///
    /// # Errors
    ///
    /// Fails if `T` cannot be assigned a component id.
    pub fn include<T: Component>(self, registry: &TypeRegistry) -> EcsResult<Self> {
        Ok(self.include_type(registry.id_of::<T>()?))
    }

    /// Forbids `T` on matching entities.
    ///
    /// # Errors
    ///
    /// Fails if `T` cannot be assigned a component id.
    pub fn exclude<T: Component>(self, registry: &TypeRegistry) -> EcsResult<Self> {
        Ok(self.exclude_type(registry.id_of::<T>()?))
    }

    /// Requires a component type by id.
    #[must_use]
    pub const fn include_type(self, component: ComponentType) -> Self {
        Self {
            inclusions: self.inclusions.with(component),
            exclusions: self.exclusions,
        }
    }

    /// Forbids a component type by id.
    #[must_use]
    pub const fn exclude_type(self, component: ComponentType) -> Self {
        Self {
            inclusions: self.inclusions,
            exclusions: self.exclusions.with(component),
        }
    }

    /// Required component types.
    #[inline]
    #[must_use]
    pub const fn inclusions(&self) -> ComponentBits {
        self.inclusions
    }

    /// Forbidden component types.
    #[inline]
    #[must_use]
    pub const fn exclusions(&self) -> ComponentBits {
        self.exclusions
    }

    /// Returns `true` if the mask has no inclusions.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.inclusions.is_empty()
    }

    /// Per-type interest test for `T`.
    ///
    /// A type the registry has never seen cannot be in either set, so it is
    /// interesting exactly when the mask is open.
    #[must_use]
    pub fn interested_in<T: Component>(&self, registry: &TypeRegistry) -> bool {
        match registry.get::<T>() {
            Some(component) => self.interested_in_type(component),
            None => self.is_open(),
        }
    }

    /// Per-type interest test by id.
    #[inline]
    #[must_use]
    pub const fn interested_in_type(&self, component: ComponentType) -> bool {
        (self.inclusions.is_empty() || self.inclusions.contains(component))
            && !self.exclusions.contains(component)
    }

    /// Whole-entity test against an entity's component bits.
    #[inline]
    #[must_use]
    pub const fn matches(&self, bits: ComponentBits) -> bool {
        bits.contains_all(self.inclusions) && !bits.intersects(self.exclusions)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMask")
            .field("inclusions", &format_args!("{:#018x}", self.inclusions.raw()))
            .field("exclusions", &format_args!("{:#018x}", self.exclusions.raw()))
            .finish()
    }
}

/// An immutable query, value-equal by its mask.
///
/// Aspects built from the same type sets compare equal and hash identically,
/// so they collapse onto one cached subscription.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Aspect, Component, TypeRegistry};
///
/// #[derive(Default)]
/// struct Position;
/// impl Component for Position {}
///
/// #[derive(Default)]
/// struct Velocity;
/// impl Component for Velocity {}
///
/// let registry = TypeRegistry::new();
/// let a = Aspect::of::<(Position, Velocity)>(&registry).unwrap();
/// let b = Aspect::of::<(Velocity, Position)>(&registry).unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Aspect(ComponentMask);

impl Aspect {
    /// An aspect matching every entity.
    #[must_use]
    pub const fn all() -> Self {
        Self(ComponentMask::new())
    }

    /// An aspect requiring every type in `S`.
    ///
    /// # Errors
    ///
    /// Fails if a member of `S` cannot be assigned a component id.
    pub fn of<S: ComponentSet>(registry: &TypeRegistry) -> EcsResult<Self> {
        Ok(Self(ComponentMask {
            inclusions: S::bits(registry)?,
            exclusions: ComponentBits::EMPTY,
        }))
    }

    /// Returns this aspect with every type in `S` forbidden.
    ///
    /// # Errors
    ///
    /// Fails if a member of `S` cannot be assigned a component id.
    pub fn excluding<S: ComponentSet>(self, registry: &TypeRegistry) -> EcsResult<Self> {
        let mut mask = self.0;
        mask.exclusions = ComponentBits::from_raw(mask.exclusions.raw() | S::bits(registry)?.raw());
        Ok(Self(mask))
    }

    /// Wraps an existing mask.
    #[must_use]
    pub const fn from_mask(mask: ComponentMask) -> Self {
        Self(mask)
    }

    /// The underlying mask.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &ComponentMask {
        &self.0
    }

    /// Whole-entity test, see [`ComponentMask::matches`].
    #[inline]
    #[must_use]
    pub const fn matches(&self, bits: ComponentBits) -> bool {
        self.0.matches(bits)
    }
}

impl From<ComponentMask> for Aspect {
    fn from(mask: ComponentMask) -> Self {
        Self(mask)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;

    #[derive(Default)]
    struct Position;
    impl Component for Position {}

    #[derive(Default)]
    struct Velocity;
    impl Component for Velocity {}

    #[derive(Default)]
    struct Frozen;
    impl Component for Frozen {}

    #[derive(Default)]
    struct NeverRegistered;
    impl Component for NeverRegistered {}

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_open_mask_with_exclusion() {
        let registry = TypeRegistry::new();
        let mask = ComponentMask::new().exclude::<Frozen>(&registry).unwrap();

        assert!(!mask.interested_in::<Frozen>(&registry));
        assert!(mask.interested_in::<Position>(&registry));
        assert!(mask.interested_in::<NeverRegistered>(&registry));
    }

    #[test]
    fn test_inclusions_restrict_interest() {
        let registry = TypeRegistry::new();
        let mask = ComponentMask::new()
            .include::<Position>(&registry)
            .unwrap()
            .exclude::<Frozen>(&registry)
            .unwrap();

        assert!(mask.interested_in::<Position>(&registry));
        assert!(!mask.interested_in::<Velocity>(&registry));
        assert!(!mask.interested_in::<Frozen>(&registry));
        assert!(!mask.interested_in::<NeverRegistered>(&registry));
    }

    #[test]
    fn test_type_in_both_sets_is_not_interesting() {
        let registry = TypeRegistry::new();
        let mask = ComponentMask::new()
            .include::<Position>(&registry)
            .unwrap()
            .exclude::<Position>(&registry)
            .unwrap();
        assert!(!mask.interested_in::<Position>(&registry));
    }

    #[test]
    fn test_whole_entity_matching() {
        let registry = TypeRegistry::new();
        let position = registry.id_of::<Position>().unwrap();
        let velocity = registry.id_of::<Velocity>().unwrap();
        let frozen = registry.id_of::<Frozen>().unwrap();

        let aspect = Aspect::of::<(Position, Velocity)>(&registry)
            .unwrap()
            .excluding::<(Frozen,)>(&registry)
            .unwrap();

        let moving = ComponentBits::EMPTY.with(position).with(velocity);
        assert!(aspect.matches(moving));
        assert!(!aspect.matches(moving.with(frozen)));
        assert!(!aspect.matches(ComponentBits::EMPTY.with(position)));
        assert!(Aspect::all().matches(ComponentBits::EMPTY));
    }

    #[test]
    fn test_equal_aspects_hash_identically() {
        let registry = TypeRegistry::new();
        let a = Aspect::of::<(Position, Velocity)>(&registry).unwrap();
        let b = Aspect::of::<(Position, Velocity)>(&registry).unwrap();
        let c = Aspect::of::<(Position,)>(&registry).unwrap();

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);

        let built = Aspect::from(
            ComponentMask::new()
                .include::<Velocity>(&registry)
                .unwrap()
                .include::<Position>(&registry)
                .unwrap(),
        );
        assert_eq!(built, a);
    }
}
