//! Per-scene map from component type to its single storage.

use std::any::type_name;
use std::fmt;

use tracing::debug;

use super::{ComponentStorage, ErasedStorage};
use crate::ecs::component::{Component, ComponentBits, ComponentType, TypeRegistry};
use crate::error::{EcsError, EcsResult};

/// Holds at most one [`ComponentStorage`] per registered component type.
///
/// A storage can be temporarily detached for a parallel pass; while
/// detached, typed lookups report [`EcsError::ComponentBorrowed`].
pub struct StorageRegistry {
    types: TypeRegistry,
    registered: ComponentBits,
    storages: Vec<Option<Box<dyn ErasedStorage>>>,
}

impl StorageRegistry {
    /// Creates an empty registry that resolves ids through `types`.
    #[must_use]
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            types,
            registered: ComponentBits::EMPTY,
            storages: Vec::new(),
        }
    }

    /// The type registry ids are resolved through.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Component types with a storage.
    #[inline]
    #[must_use]
    pub const fn registered(&self) -> ComponentBits {
        self.registered
    }

    /// Registers `storage` as the storage for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentAlreadyRegistered`] if `T` already has a
    /// storage, or a registry error if `T` cannot be assigned an id.
    pub fn register<T: Component>(&mut self, storage: ComponentStorage<T>) -> EcsResult<ComponentType> {
        let component = self.types.id_of::<T>()?;
        if self.registered.contains(component) {
            return Err(EcsError::ComponentAlreadyRegistered {
                component: type_name::<T>(),
            });
        }

        let index = component.id() as usize;
        if index >= self.storages.len() {
            self.storages.resize_with(index + 1, || None);
        }
        debug!(
            component = type_name::<T>(),
            id = component.id(),
            kind = ?storage.kind(),
            "Registered component storage"
        );
        self.storages[index] = Some(Box::new(storage));
        self.registered.insert(component);
        Ok(component)
    }

    /// Returns the id of `T`, which must have a storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage.
    pub fn component_type<T: Component>(&self) -> EcsResult<ComponentType> {
        self.types
            .get::<T>()
            .filter(|&component| self.registered.contains(component))
            .ok_or(EcsError::UnregisteredComponent {
                component: type_name::<T>(),
            })
    }

    /// Returns the storage of `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredComponent`] if `T` has no storage, or
    /// [`EcsError::ComponentBorrowed`] while it is detached.
    pub fn get<T: Component>(&self) -> EcsResult<&ComponentStorage<T>> {
        let component = self.component_type::<T>()?;
        self.erased(component)
            .ok_or(EcsError::ComponentBorrowed {
                component: type_name::<T>(),
            })?
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
            .ok_or(EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
            })
    }

    /// Returns the storage of `T` mutably.
    ///
    /// # Errors
    ///
    /// Same as [`StorageRegistry::get`].
    pub fn get_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentStorage<T>> {
        let component = self.component_type::<T>()?;
        self.erased_mut(component)
            .ok_or(EcsError::ComponentBorrowed {
                component: type_name::<T>(),
            })?
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
            .ok_or(EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
            })
    }

    pub(crate) fn erased(&self, component: ComponentType) -> Option<&dyn ErasedStorage> {
        self.storages.get(component.id() as usize)?.as_deref()
    }

    pub(crate) fn erased_mut(
        &mut self,
        component: ComponentType,
    ) -> Option<&mut (dyn ErasedStorage + 'static)> {
        self.storages.get_mut(component.id() as usize)?.as_deref_mut()
    }

    /// Every attached storage, with its component type.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (ComponentType, &mut (dyn ErasedStorage + 'static))> + '_ {
        self.storages
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_deref_mut()
                    .map(|storage| (ComponentType::from_id(index as u8), storage))
            })
    }

    /// Takes the storage of `T` out of the registry for a parallel pass.
    ///
    /// # Errors
    ///
    /// Same as [`StorageRegistry::get`].
    pub(crate) fn detach<T: Component>(&mut self) -> EcsResult<(ComponentType, Box<ComponentStorage<T>>)> {
        let component = self.component_type::<T>()?;
        let borrowed = EcsError::ComponentBorrowed {
            component: type_name::<T>(),
        };
        let slot = self
            .storages
            .get_mut(component.id() as usize)
            .ok_or_else(|| borrowed.clone())?;
        let storage = slot.take().ok_or(borrowed)?;

        if !storage.as_any().is::<ComponentStorage<T>>() {
            *slot = Some(storage);
            return Err(EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
            });
        }

        storage
            .into_any()
            .downcast::<ComponentStorage<T>>()
            .map(|storage| (component, storage))
            .map_err(|_| EcsError::ComponentTypeMismatch {
                expected: type_name::<T>(),
            })
    }

    /// Puts a detached storage back.
    pub(crate) fn attach<T: Component>(&mut self, component: ComponentType, storage: Box<ComponentStorage<T>>) {
        if let Some(slot) = self.storages.get_mut(component.id() as usize) {
            *slot = Some(storage);
        }
    }

    /// Empties every storage, keeping registrations.
    pub fn clear(&mut self) {
        for (_, storage) in self.iter_mut() {
            storage.clear();
        }
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.storages
                    .iter()
                    .flatten()
                    .map(|storage| (storage.type_name(), storage.len())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::EntityId;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position(f32);
    impl Component for Position {}

    #[derive(Default)]
    struct Unregistered;
    impl Component for Unregistered {}

    #[test]
    fn test_register_and_lookup() {
        let mut registry = StorageRegistry::new(TypeRegistry::new());
        let id = registry.register(ComponentStorage::<Position>::dense()).unwrap();

        assert_eq!(registry.component_type::<Position>(), Ok(id));
        registry
            .get_mut::<Position>()
            .unwrap()
            .add_component(EntityId::new(0, 0), Some(Position(2.0)));
        assert_eq!(
            registry.get::<Position>().unwrap().get_component(EntityId::new(0, 0)),
            Some(&Position(2.0))
        );
    }

    #[test]
    fn test_double_registration_fails() {
        let mut registry = StorageRegistry::new(TypeRegistry::new());
        registry.register(ComponentStorage::<Position>::sparse()).unwrap();
        assert!(matches!(
            registry.register(ComponentStorage::<Position>::dense()),
            Err(EcsError::ComponentAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_unregistered_access_fails() {
        let types = TypeRegistry::new();
        types.id_of::<Unregistered>().unwrap();
        let registry = StorageRegistry::new(types);

        assert!(matches!(
            registry.get::<Unregistered>(),
            Err(EcsError::UnregisteredComponent { .. })
        ));
    }

    #[test]
    fn test_detach_and_attach() {
        let mut registry = StorageRegistry::new(TypeRegistry::new());
        registry.register(ComponentStorage::<Position>::sparse()).unwrap();

        let (id, storage) = registry.detach::<Position>().unwrap();
        assert!(matches!(
            registry.get::<Position>(),
            Err(EcsError::ComponentBorrowed { .. })
        ));
        assert!(registry.detach::<Position>().is_err());

        registry.attach(id, storage);
        assert!(registry.get::<Position>().is_ok());
    }
}
