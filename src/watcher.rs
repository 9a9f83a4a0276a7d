//! Batched notification fan-out keyed by (context, component-id) (spec §4.4).
//!
//! A watcher exists so a reactive system doesn't have to poll a context's
//! matching set every frame looking for what changed -- it gets handed a
//! coalesced, cancellation-aware batch once per frame instead. Enqueuing
//! is the one piece of this crate that has to tolerate a non-owning
//! thread (an IO callback marshaling an event in), so [`ComponentWatcher`]
//! guards its pending table with a `Mutex` even though everything else in
//! the world is strictly single-threaded (spec §5).

use std::sync::Mutex;

use indexmap::IndexSet;

use crate::context::ContextId;
use crate::entity::Entity;
use crate::registry::ComponentId;

/// What happened to a component on an entity, from a watching system's
/// point of view.
///
/// Drained in this fixed order every frame -- `added`, `modified`,
/// `removed`, `enabled`, `disabled` -- so a reactive system can assume a
/// stable processing order even though entities within each bucket are
/// only ordered by first-insertion (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationKind {
  Added,
  Modified,
  Removed,
  Enabled,
  Disabled,
}

impl NotificationKind {
  pub(crate) const DRAIN_ORDER: [NotificationKind; 5] = [
    NotificationKind::Added,
    NotificationKind::Modified,
    NotificationKind::Removed,
    NotificationKind::Enabled,
    NotificationKind::Disabled,
  ];
}

#[derive(Default)]
struct PendingTable {
  added: IndexSet<Entity, ahash::RandomState>,
  modified: IndexSet<Entity, ahash::RandomState>,
  removed: IndexSet<Entity, ahash::RandomState>,
  enabled: IndexSet<Entity, ahash::RandomState>,
  disabled: IndexSet<Entity, ahash::RandomState>,
}

impl PendingTable {
  fn bucket_mut(&mut self, kind: NotificationKind) -> &mut IndexSet<Entity, ahash::RandomState> {
    match kind {
      NotificationKind::Added => &mut self.added,
      NotificationKind::Modified => &mut self.modified,
      NotificationKind::Removed => &mut self.removed,
      NotificationKind::Enabled => &mut self.enabled,
      NotificationKind::Disabled => &mut self.disabled,
    }
  }

  fn is_empty(&self) -> bool {
    self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty() && self.enabled.is_empty() && self.disabled.is_empty()
  }
}

/// A batch of coalesced notifications, ready to hand to reactive systems
/// in `added -> modified -> removed -> enabled -> disabled` order.
#[derive(Default)]
pub struct NotificationBatch {
  buckets: Vec<(NotificationKind, Vec<Entity>)>,
}

impl NotificationBatch {
  pub fn iter(&self) -> impl Iterator<Item = (NotificationKind, &[Entity])> {
    self.buckets.iter().map(|(kind, entities)| (*kind, entities.as_slice()))
  }

  pub fn is_empty(&self) -> bool {
    self.buckets.iter().all(|(_, e)| e.is_empty())
  }

  /// A batch holding a single kind/entity-list pair. Used to hand a
  /// message send's targets to a `Reactive` system the same way a
  /// watcher's drained notifications are handed to one, without a
  /// `ComponentWatcher` ever being involved.
  pub(crate) fn single(kind: NotificationKind, entities: Vec<Entity>) -> Self {
    Self { buckets: vec![(kind, entities)] }
  }
}

/// One per (context, component-id) pair anything has ever registered
/// interest in. Owns the pending-notifications table and enforces the
/// added/removed and added/disabled cancellation rules at enqueue time.
#[derive(Default)]
pub(crate) struct ComponentWatcher {
  pub(crate) context: ContextId,
  pub(crate) component: ComponentId,
  pending: Mutex<PendingTable>,
}

impl ComponentWatcher {
  pub(crate) fn new(context: ContextId, component: ComponentId) -> Self {
    Self {
      context,
      component,
      pending: Mutex::new(PendingTable::default()),
    }
  }

  /// Enqueue `kind` for `entity`, applying the enqueue-time cancellation
  /// rules (§5). `destroy_caused` distinguishes a `Removed` fired by
  /// [`World::destroy`](crate::world::World::destroy) from one fired by a
  /// plain component removal -- a pending `Added` still cancels a plain
  /// removal outright (the entity was never observed alive), but a
  /// destroy-caused removal is always delivered (§4.4, §8). Returns `true`
  /// if this is the watcher's first pending notification since its last
  /// drain -- the caller uses that to mark the watcher for a frame-end
  /// drain exactly once.
  pub(crate) fn queue(&self, kind: NotificationKind, entity: Entity, destroy_caused: bool) -> bool {
    let mut table = self.pending.lock().expect("watcher lock poisoned");
    let was_empty = table.is_empty();

    match kind {
      NotificationKind::Removed => {
        let had_pending_add = table.added.shift_remove(&entity);
        if had_pending_add && !destroy_caused {
          // Added+removed within the same undrained window cancels both
          // (spec §8 scenario 2): the entity was never observed alive.
          return false;
        }
      }
      NotificationKind::Disabled => {
        if table.added.shift_remove(&entity) {
          return false;
        }
      }
      _ => {}
    }

    table.bucket_mut(kind).insert(entity);
    was_empty
  }

  /// Atomically take every pending notification, dropping any entity in a
  /// non-`removed` bucket that's already destroyed (it was never actually
  /// observed alive, so there's nothing to deliver but its removal).
  pub(crate) fn drain(&self, is_destroyed: impl Fn(Entity) -> bool) -> NotificationBatch {
    let mut table = self.pending.lock().expect("watcher lock poisoned");
    let PendingTable { added, modified, removed, enabled, disabled } = std::mem::take(&mut *table);
    drop(table);

    let mut sets = [Some(added), Some(modified), Some(removed), Some(enabled), Some(disabled)];
    let mut batch = NotificationBatch::default();
    for (slot, kind) in sets.iter_mut().zip(NotificationKind::DRAIN_ORDER) {
      let set = slot.take().expect("each drain-order slot is visited exactly once");
      let entities: Vec<Entity> = if kind == NotificationKind::Removed {
        set.into_iter().collect()
      } else {
        set.into_iter().filter(|e| !is_destroyed(*e)).collect()
      };
      batch.buckets.push((kind, entities));
    }
    batch
  }
}

/// Identifies a single watcher -- the (context, component-id) pair it was
/// constructed from. [`World`](crate::world::World) uses this as the key
/// of its "has pending work" set, populated on the first [`ComponentWatcher::queue`]
/// call since the last drain so the frame-end drain doesn't have to scan
/// every watcher that was ever created.
pub(crate) type WatcherId = (ContextId, ComponentId);
