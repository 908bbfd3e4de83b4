//! # Deferred Structural Commands
//!
//! Structural changes (entity creation and destruction, component attach and
//! detach) never touch live state directly. They are queued here and applied
//! in order at the scene's next flush, so a subscription being iterated is
//! never mutated underneath its iterator.
//!
//! The queue rides on a `crossbeam-channel`, so [`CommandSender`] handles can
//! be cloned into parallel systems and used from worker threads.

use std::any::Any;
use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::component::ComponentType;
use super::entity::EntityId;
use crate::error::{EcsError, EcsResult};

/// One deferred structural change.
pub enum Command {
    /// Make a freshly allocated entity visible.
    CreateEntity {
        /// The allocated entity.
        entity: EntityId,
    },
    /// Destroy an entity and drop its components.
    DestroyEntity {
        /// The entity to destroy.
        entity: EntityId,
    },
    /// Attach (or overwrite) a component.
    AddComponent {
        /// Target entity.
        entity: EntityId,
        /// Component type of `value`.
        component: ComponentType,
        /// The component payload.
        value: Box<dyn Any + Send>,
    },
    /// Detach a component.
    RemoveComponent {
        /// Target entity.
        entity: EntityId,
        /// Component type to detach.
        component: ComponentType,
    },
}

impl Command {
    /// The entity this command targets.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        match self {
            Self::CreateEntity { entity }
            | Self::DestroyEntity { entity }
            | Self::AddComponent { entity, .. }
            | Self::RemoveComponent { entity, .. } => *entity,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateEntity { entity } => f.debug_struct("CreateEntity").field("entity", entity).finish(),
            Self::DestroyEntity { entity } => f.debug_struct("DestroyEntity").field("entity", entity).finish(),
            Self::AddComponent { entity, component, .. } => f
                .debug_struct("AddComponent")
                .field("entity", entity)
                .field("component", component)
                .finish_non_exhaustive(),
            Self::RemoveComponent { entity, component } => f
                .debug_struct("RemoveComponent")
                .field("entity", entity)
                .field("component", component)
                .finish(),
        }
    }
}

/// FIFO of pending [`Command`]s owned by a scene.
#[derive(Debug)]
pub struct CommandQueue {
    sender: CommandSender,
    receiver: Receiver<Command>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: CommandSender { sender },
            receiver,
        }
    }

    /// Queues a command. Cannot fail while the queue owns its receiver.
    pub fn push(&self, command: Command) {
        // The receiver lives in `self`, so the channel is never disconnected.
        let _ = self.sender.sender.send(command);
    }

    /// Takes every queued command, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = Command> + '_ {
        self.receiver.try_iter()
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns a cloneable, thread-safe handle for queueing commands.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle for queueing structural commands.
#[derive(Clone, Debug)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Queues a command.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CommandQueueClosed`] if the owning scene is gone.
    pub fn send(&self, command: Command) -> EcsResult<()> {
        self.sender
            .send(command)
            .map_err(|_| EcsError::CommandQueueClosed)
    }

    /// Queues destruction of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CommandQueueClosed`] if the owning scene is gone.
    pub fn destroy_entity(&self, entity: EntityId) -> EcsResult<()> {
        self.send(Command::DestroyEntity { entity })
    }

    /// Queues attachment of a type-erased component payload.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CommandQueueClosed`] if the owning scene is gone.
    pub fn add_component_boxed(
        &self,
        entity: EntityId,
        component: ComponentType,
        value: Box<dyn Any + Send>,
    ) -> EcsResult<()> {
        self.send(Command::AddComponent {
            entity,
            component,
            value,
        })
    }

    /// Queues detachment of a component type.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CommandQueueClosed`] if the owning scene is gone.
    pub fn remove_component_type(&self, entity: EntityId, component: ComponentType) -> EcsResult<()> {
        self.send(Command::RemoveComponent { entity, component })
    }
}
