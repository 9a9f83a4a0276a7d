//! The entity handle and the per-entity data bag it refers to (spec §2).
//!
//! An [`Entity`] is a generational index, but it's minted from an
//! allocator that's kept separate from the data it ends up addressing
//! (see [`World`](crate::world::World)'s `allocator`/`assocs` split). A
//! handle only ever needs a *shared* borrow of the allocator to come
//! into existence -- that's what lets [`ListenerAccess::lazy_spawn`](crate::message::ListenerAccess::lazy_spawn)
//! hand back a real, comparable `Entity` before the entity's components
//! exist anywhere. A stale handle from a destroyed and reclaimed slot
//! never silently aliases a newer entity -- it just reads back as
//! [`EntityLiveness::Destroyed`]. Component storage is a `RwLock` per
//! slot rather than one lock over the whole entity: [`World::dispatch`]
//! only ever needs a shared borrow of the world, but still has to lock
//! exactly one component for writing while message handlers on that same
//! entity read its siblings.

use std::cell::RefCell;
use std::sync::RwLock;

use ahash::AHashSet;
use generational_arena::Index;
use indexmap::IndexMap;

use crate::component::Component;
use crate::registry::ComponentId;

/// A handle to a bag of [`Component`]s living in a [`World`](crate::world::World).
///
/// Cheap to copy and compare; carries no data of its own beyond the
/// generational index it was allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity(pub(crate) Index);

/// Whether a handle still refers to something in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLiveness {
  /// The entity exists and hasn't been destroyed.
  Alive,
  /// The id has been minted (e.g. by [`ListenerAccess::lazy_spawn`](crate::message::ListenerAccess::lazy_spawn))
  /// but [`World::finalize`](crate::world::World::finalize) hasn't yet
  /// given it a components bag. Nothing but `World::finalize` should
  /// ever observe this.
  PartiallySpawned,
  /// The entity was destroyed (or its id was never allocated, or has
  /// since been recycled by a different entity). These aren't
  /// distinguished from the caller's perspective: either way, the
  /// handle no longer addresses anything live.
  Destroyed,
}

pub(crate) type ComponentEntry = RwLock<Box<dyn Component>>;

/// The data bag referred to by an [`Entity`]: its components, keyed by
/// registry id in attachment order, plus the bits of bookkeeping the
/// frame pipeline needs.
pub(crate) struct EntityData {
  pub(crate) components: IndexMap<ComponentId, ComponentEntry, ahash::RandomState>,
  pub(crate) active: bool,
  /// Set once [`World::destroy`](crate::world::World::destroy) is called;
  /// the entity stays addressable (and its destroyed notifications stay
  /// pending) until [`World::finalize`](crate::world::World::finalize)
  /// actually reclaims the arena slot.
  pub(crate) destroyed: bool,
  /// Message type ids sent to this entity so far this frame. Wrapped in a
  /// `RefCell` because [`World::dispatch`](crate::world::World::dispatch)
  /// only ever holds `&World` -- a handler can dispatch a message to an
  /// entity whose components are still borrowed elsewhere on the call
  /// stack, so recording the send can't wait for a `&mut World`. Cleared
  /// by [`World::clear_frame_messages`](crate::world::World::clear_frame_messages).
  pub(crate) messages_this_frame: RefCell<AHashSet<ComponentId>>,
}

impl EntityData {
  pub(crate) fn new(components: IndexMap<ComponentId, ComponentEntry, ahash::RandomState>) -> Self {
    Self {
      components,
      active: true,
      destroyed: false,
      messages_this_frame: RefCell::new(AHashSet::new()),
    }
  }

  pub(crate) fn empty() -> Self {
    Self::new(IndexMap::default())
  }

  pub(crate) fn len(&self) -> usize {
    self.components.len()
  }

  pub(crate) fn has(&self, id: ComponentId) -> bool {
    self.components.contains_key(&id)
  }

  pub(crate) fn does_match(&self, all_of: &AHashSet<ComponentId>, any_of: &AHashSet<ComponentId>, none_of: &AHashSet<ComponentId>) -> bool {
    if none_of.iter().any(|id| self.has(*id)) {
      return false;
    }
    if !all_of.iter().all(|id| self.has(*id)) {
      return false;
    }
    if !any_of.is_empty() && !any_of.iter().any(|id| self.has(*id)) {
      return false;
    }
    true
  }
}

/// Iterator over every live entity in a [`World`](crate::world::World).
///
/// Walks the `assocs` map rather than the allocator, so a partially
/// spawned (allocated-but-not-finished) entity never shows up here.
pub struct EntityIter<'w> {
  pub(crate) iter: std::collections::hash_map::Iter<'w, Entity, EntityData>,
}

impl<'w> Iterator for EntityIter<'w> {
  type Item = Entity;

  fn next(&mut self) -> Option<Self::Item> {
    for (entity, data) in self.iter.by_ref() {
      if !data.destroyed {
        return Some(*entity);
      }
    }
    None
  }
}

impl<'w> std::iter::FusedIterator for EntityIter<'w> {}
