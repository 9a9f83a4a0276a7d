//! Traits abstracting over the different kinds of access a caller can
//! have to a [`World`](crate::world::World) -- direct, from inside a
//! message handler, or from inside a spawn/destroy callback.
//!
//! `World` implements all of these so code that doesn't care which kind
//! of access it was given can stay generic over them.

use crate::entity::{Entity, EntityIter, EntityLiveness};
use crate::message::Message;
use crate::query::Query;
use crate::resource::{ReadResource, Resource, ResourceLookupError, WriteResource};

/// Accesses that can dispatch messages to entities.
pub trait AccessDispatcher {
  /// Dispatch a message to the given entity, passing it through each
  /// component that has registered a handler for that message type, in
  /// the order components were attached.
  fn dispatch<M: Message>(&self, target: Entity, msg: M) -> M;

  /// Whether `entity` has been sent a message of type `M` so far this
  /// frame. Cleared at frame end along with every other message record.
  fn received_message<M: Message>(&self, entity: Entity) -> bool;
}

/// Accesses that can get information about entities.
pub trait AccessEntityStats {
  /// Number of live entities in the world.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Alive / destroyed / never-spawned state of `entity`.
  fn liveness(&self, entity: Entity) -> EntityLiveness;

  /// Number of components on `entity`. Panics if it's dead.
  fn len_of(&self, entity: Entity) -> usize;

  /// Iterate over every live entity.
  ///
  /// There's no built-in join/query-over-everything here; filter it
  /// yourself, or better, register a [`Context`](crate::context::Context)
  /// through a system's filter so the matching set is maintained for you.
  fn iter(&self) -> EntityIter<'_>;
}

/// Accesses that can run zero-cost component queries.
pub trait AccessQuery {
  /// Query `interrogatee` for the given components. Panics if it's dead.
  fn query<'c, Q: Query<'c>>(&'c self, interrogatee: Entity) -> Option<Q::Response>;
}

/// Accesses that can read and write resources.
pub trait AccessResources {
  fn read_resource<R: Resource>(&self) -> Result<ReadResource<'_, R>, ResourceLookupError>;
  fn write_resource<R: Resource>(&self) -> Result<WriteResource<'_, R>, ResourceLookupError>;
  fn contains_resource<R: Resource>(&self) -> bool;
}
