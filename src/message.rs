//! Ephemeral payloads threaded through an entity's components (spec §3,
//! §4.2).
//!
//! Dispatching a message walks the target entity's components in
//! attachment order; each component with a handler registered for that
//! message type gets to read or mutate the payload before it's passed to
//! the next one, and the final value comes back to the caller. The same
//! call also records the message against the entity's current-frame
//! bucket (queryable through [`AccessDispatcher::received_message`]) and
//! queues it for the next fixed-update tick, which is what lets a
//! `Reactive` system declared through [`SystemDescriptor::reacts_to_message`](crate::system::SystemDescriptor::reacts_to_message)
//! and a state machine's [`WaitDirective::Message`](crate::state_machine::WaitDirective::Message)
//! both observe it without the sender knowing either exists.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel;
use downcast::{downcast, Any};

use crate::access::{AccessDispatcher, AccessEntityStats, AccessQuery, AccessResources};
use crate::builder::LazyEntityBuilder;
use crate::component::Component;
use crate::entity::{Entity, EntityIter, EntityLiveness};
use crate::query::Query;
use crate::resource::{ReadResource, Resource, ResourceLookupError, WriteResource};
use crate::world::{LazyUpdate, World};

/// Ephemeral data sent to an entity and threaded through its components.
///
/// A message is only ever observed for the one frame it's dispatched in;
/// nothing about its type is persisted on the entity the way a
/// [`Component`] is. The trait itself carries no behavior -- it exists so
/// `downcast` can give handler dispatch a safe path from `Box<dyn
/// Message>` back to the concrete payload type.
pub trait Message: Any {}
downcast!(dyn Message);

/// A message handler that only needs immutable access to its component.
pub type MsgHandlerRead<C, M> = fn(this: &C, event: M, owner: Entity, access: &ListenerAccess) -> M;
/// A message handler that needs mutable access to its component.
pub type MsgHandlerWrite<C, M> = fn(this: &mut C, event: M, owner: Entity, access: &ListenerAccess) -> M;

pub(crate) enum MsgHandlerInner {
  Read(Box<dyn Send + Sync + Fn(&dyn Component, Box<dyn Message>, Entity, &ListenerAccess) -> Box<dyn Message>>),
  Write(Box<dyn Send + Sync + Fn(&mut dyn Component, Box<dyn Message>, Entity, &ListenerAccess) -> Box<dyn Message>>),
}

/// Access given to a message handler while it's running.
///
/// Handlers only ever see `&World`-shaped access, never `&mut World`: a
/// dispatch chain is already holding a shared borrow of the world (and a
/// write lock on the one component currently handling the message), so
/// anything structural -- spawning, despawning, adding or removing a
/// component, sending a message to a *different* entity -- has to be
/// deferred. It's queued here and only takes effect once
/// [`World::finalize`](crate::world::World::finalize) runs, same as the
/// reactive-system lazy queue.
pub struct ListenerAccess<'w> {
  lazy_updates: channel::Sender<LazyUpdate>,
  queued_message_tx: channel::Sender<(Box<dyn Message>, Entity)>,
  queued_message_rx: channel::Receiver<(Box<dyn Message>, Entity)>,
  cancelled: AtomicBool,

  pub(crate) world: &'w World,
}

impl<'w> ListenerAccess<'w> {
  pub(crate) fn new(world: &'w World) -> Self {
    let (tx, rx) = channel::unbounded();
    Self {
      lazy_updates: world.lazy_sender(),
      queued_message_tx: tx,
      queued_message_rx: rx,
      cancelled: AtomicBool::new(false),
      world,
    }
  }

  /// Queue dispatching a message to `target` once the current message has
  /// finished threading through this entity's components.
  ///
  /// Because the new dispatch is deferred, you never get its resulting
  /// value back -- if you need that, dispatch immediately through
  /// [`AccessDispatcher::dispatch`] instead, which is safe as long as
  /// `target` isn't an ancestor of a component currently borrowed on the
  /// stack (see [`crate::loop_panic`]).
  pub fn queue_dispatch<M: Message>(&self, target: Entity, msg: M) {
    self.queued_message_tx.send((Box::new(msg), target)).expect("receiver outlives every sender");
  }

  /// Set up an entity to be spawned once [`World::finalize`] runs.
  pub fn lazy_spawn(&self) -> LazyEntityBuilder<'_> {
    LazyEntityBuilder::new(self)
  }

  /// Queue `entity` for destruction once [`World::finalize`] runs.
  pub fn lazy_destroy(&self, entity: Entity) {
    self.queue_update(LazyUpdate::Destroy(entity));
  }

  /// Cancel the message, preventing it from reaching any later component
  /// in this dispatch chain.
  ///
  /// Handy for control flow, and for efficiency: a cancelled dispatch
  /// skips straight to returning instead of locking every remaining
  /// component on the entity.
  pub fn cancel(&self) {
    self.set_cancellation(true)
  }

  /// Set the cancellation state directly. See [`Self::cancel`].
  pub fn set_cancellation(&self, cancelled: bool) {
    self.cancelled.store(cancelled, Ordering::Relaxed);
  }

  /// Whether [`Self::cancel`] has been called for this dispatch.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  pub(crate) fn queue_update(&self, update: LazyUpdate) {
    self.lazy_updates.send(update).expect("receiver outlives every sender");
  }

  pub(crate) fn queued_message_rx(&self) -> &channel::Receiver<(Box<dyn Message>, Entity)> {
    &self.queued_message_rx
  }
}

impl<'w> AccessDispatcher for ListenerAccess<'w> {
  fn dispatch<M: Message>(&self, target: Entity, msg: M) -> M {
    self.world.dispatch(target, msg)
  }

  fn received_message<M: Message>(&self, entity: Entity) -> bool {
    self.world.received_message::<M>(entity)
  }
}

impl<'w> AccessEntityStats for ListenerAccess<'w> {
  fn len(&self) -> usize {
    self.world.len()
  }

  fn liveness(&self, entity: Entity) -> EntityLiveness {
    self.world.liveness(entity)
  }

  fn len_of(&self, entity: Entity) -> usize {
    self.world.len_of(entity)
  }

  fn iter(&self) -> EntityIter<'_> {
    self.world.iter()
  }
}

impl<'w> AccessQuery for ListenerAccess<'w> {
  fn query<'c, Q: Query<'c>>(&'c self, interrogatee: Entity) -> Option<Q::Response> {
    self.world.query::<Q>(interrogatee)
  }
}

impl<'w> AccessResources for ListenerAccess<'w> {
  fn read_resource<R: Resource>(&self) -> Result<ReadResource<'_, R>, ResourceLookupError> {
    self.world.read_resource()
  }

  fn write_resource<R: Resource>(&self) -> Result<WriteResource<'_, R>, ResourceLookupError> {
    self.world.write_resource()
  }

  fn contains_resource<R: Resource>(&self) -> bool {
    self.world.contains_resource::<R>()
  }
}
