//! # Aspect Subscriptions
//!
//! An [`AspectSubscription`] is the live set of entities matching one
//! [`Aspect`]. The [`AspectManager`] caches one subscription per distinct
//! aspect and keeps every subscription up to date from the per-flush change
//! set, so no system ever scans all entities to find its targets.
//!
//! Membership only changes inside [`AspectManager::refresh`]. Between two
//! refreshes a subscription is a frame-stable snapshot that systems can
//! iterate while queueing structural changes.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::aspect::Aspect;
use super::bag::EntityBag;
use super::component::ComponentBits;
use super::entity::EntityId;
use super::slot_map::{Key, SlotMap};

/// Handle to a subscription cached by an [`AspectManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    index: u32,
    generation: u32,
}

impl Key for SubscriptionId {
    #[inline]
    fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    fn index(self) -> u32 {
        self.index
    }

    #[inline]
    fn generation(self) -> u32 {
        self.generation
    }
}

/// Membership change reported to subscription listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// The entity now matches the aspect.
    EntityAdded(EntityId),
    /// The entity no longer matches the aspect, or was destroyed.
    EntityRemoved(EntityId),
}

type Listener = Box<dyn FnMut(SubscriptionEvent) + Send>;

/// Entities currently matching one aspect, plus membership listeners.
pub struct AspectSubscription {
    aspect: Aspect,
    members: EntityBag,
    listeners: Vec<Listener>,
    refs: usize,
}

impl AspectSubscription {
    fn new(aspect: Aspect) -> Self {
        Self {
            aspect,
            members: EntityBag::new(),
            listeners: Vec::new(),
            refs: 0,
        }
    }

    /// The aspect this subscription tracks.
    #[inline]
    #[must_use]
    pub const fn aspect(&self) -> &Aspect {
        &self.aspect
    }

    /// Current members, in no particular order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        self.members.as_slice()
    }

    /// Current members as a bag.
    #[inline]
    #[must_use]
    pub const fn bag(&self) -> &EntityBag {
        &self.members
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing matches.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(entity)
    }

    /// Number of holders sharing this subscription.
    #[inline]
    #[must_use]
    pub const fn ref_count(&self) -> usize {
        self.refs
    }

    /// Registers a callback for membership changes.
    pub fn listen<F>(&mut self, listener: F)
    where
        F: FnMut(SubscriptionEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: SubscriptionEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    fn add(&mut self, entity: EntityId) {
        if self.members.insert(entity) {
            self.notify(SubscriptionEvent::EntityAdded(entity));
        }
    }

    fn remove(&mut self, entity: EntityId) {
        if self.members.remove(entity) {
            self.notify(SubscriptionEvent::EntityRemoved(entity));
        }
    }
}

impl fmt::Debug for AspectSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectSubscription")
            .field("aspect", &self.aspect)
            .field("members", &self.members.len())
            .field("listeners", &self.listeners.len())
            .field("refs", &self.refs)
            .finish()
    }
}

/// Caches one [`AspectSubscription`] per distinct [`Aspect`].
#[derive(Debug, Default)]
pub struct AspectManager {
    subscriptions: SlotMap<SubscriptionId, AspectSubscription>,
    by_aspect: HashMap<Aspect, SubscriptionId>,
}

impl AspectManager {
    /// Creates a manager with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subscription for `aspect`, creating an empty one if none
    /// exists. Each call takes a reference that [`AspectManager::release`]
    /// gives back.
    pub fn subscribe(&mut self, aspect: Aspect) -> SubscriptionId {
        if let Some(&id) = self.by_aspect.get(&aspect) {
            if let Some(subscription) = self.subscriptions.try_get_mut(id) {
                subscription.refs += 1;
                return id;
            }
        }

        let mut subscription = AspectSubscription::new(aspect);
        subscription.refs = 1;
        let id = self.subscriptions.add(subscription);
        self.by_aspect.insert(aspect, id);
        debug!(?aspect, ?id, "Created aspect subscription");
        id
    }

    /// Looks up the cached subscription for `aspect` without subscribing.
    #[must_use]
    pub fn find(&self, aspect: &Aspect) -> Option<SubscriptionId> {
        self.by_aspect.get(aspect).copied()
    }

    /// Gives back one reference. The subscription is dropped when the last
    /// reference goes. Returns `false` for an unknown id.
    pub fn release(&mut self, id: SubscriptionId) -> bool {
        let Some(subscription) = self.subscriptions.try_get_mut(id) else {
            return false;
        };

        subscription.refs = subscription.refs.saturating_sub(1);
        if subscription.refs == 0 {
            let aspect = subscription.aspect;
            self.subscriptions.remove(id);
            self.by_aspect.remove(&aspect);
            debug!(?aspect, "Dropped aspect subscription");
        }
        true
    }

    /// Returns a subscription.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<&AspectSubscription> {
        self.subscriptions.try_get(id)
    }

    /// Returns a subscription mutably, e.g. to attach listeners.
    pub fn get_mut(&mut self, id: SubscriptionId) -> Option<&mut AspectSubscription> {
        self.subscriptions.try_get_mut(id)
    }

    /// Members of a subscription; empty if the id is unknown.
    #[must_use]
    pub fn members(&self, id: SubscriptionId) -> &[EntityId] {
        self.get(id).map(AspectSubscription::entities).unwrap_or_default()
    }

    /// Member bag of a subscription.
    #[must_use]
    pub fn bag(&self, id: SubscriptionId) -> Option<&EntityBag> {
        self.get(id).map(AspectSubscription::bag)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if there are no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Adds every matching entity from `entities` to one subscription.
    ///
    /// Used to back-fill a subscription created after entities exist.
    pub fn seed<I>(&mut self, id: SubscriptionId, entities: I)
    where
        I: IntoIterator<Item = (EntityId, ComponentBits)>,
    {
        let Some(subscription) = self.subscriptions.try_get_mut(id) else {
            return;
        };
        for (entity, bits) in entities {
            if subscription.aspect.matches(bits) {
                subscription.add(entity);
            }
        }
    }

    /// Applies one flush worth of changes to every subscription.
    ///
    /// `removed` entities leave every subscription first. Each `changed`
    /// entity is then tested against each aspect with its current component
    /// bits: it joins subscriptions it now matches and leaves those it no
    /// longer matches.
    pub fn refresh(&mut self, changed: &[(EntityId, ComponentBits)], removed: &[EntityId]) {
        for (_, subscription) in self.subscriptions.iter_mut() {
            for &entity in removed {
                subscription.remove(entity);
            }
            for &(entity, bits) in changed {
                if subscription.aspect.matches(bits) {
                    subscription.add(entity);
                } else {
                    subscription.remove(entity);
                }
            }
        }
    }

    /// Drops every subscription.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.by_aspect.clear();
    }
}
