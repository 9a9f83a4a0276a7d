//! Run code when a component is attached to or removed from a live entity.

use crate::access::{AccessDispatcher, AccessEntityStats, AccessQuery, AccessResources};
use crate::component::Component;
use crate::entity::{Entity, EntityIter, EntityLiveness};
use crate::message::Message;
use crate::query::Query;
use crate::resource::{ReadResource, Resource, ResourceLookupError, WriteResource};
use crate::world::World;

pub(crate) type OnCreateCallback = Box<dyn Fn(&dyn Component, Entity, &CallbackWorldAccess) + Send + Sync>;
pub(crate) type OnRemoveCallback = Box<dyn Fn(Box<dyn Component>, Entity, &CallbackWorldAccess) + Send + Sync>;

pub(crate) enum Callbacks {
  Create(OnCreateCallback),
  Remove(OnRemoveCallback),
  Both(OnCreateCallback, OnRemoveCallback),
}

impl Callbacks {
  pub(crate) fn get_create(&self) -> Option<&OnCreateCallback> {
    match self {
      Callbacks::Create(cb) | Callbacks::Both(cb, _) => Some(cb),
      Callbacks::Remove(_) => None,
    }
  }

  pub(crate) fn get_remove(&self) -> Option<&OnRemoveCallback> {
    match self {
      Callbacks::Remove(cb) | Callbacks::Both(_, cb) => Some(cb),
      Callbacks::Create(_) => None,
    }
  }
}

/// Access given to a create/remove callback.
///
/// The entity passed alongside this in a remove callback is always
/// already dead, so there's no entity-mutation surface here -- just
/// enough to read other state (resources, other entities) in reaction,
/// the way you'd update a location -> entities cache.
pub struct CallbackWorldAccess<'w> {
  world: &'w World,
}

impl<'w> CallbackWorldAccess<'w> {
  pub(crate) fn new(world: &'w World) -> Self {
    Self { world }
  }
}

impl<'w> AccessDispatcher for CallbackWorldAccess<'w> {
  fn dispatch<M: Message>(&self, target: Entity, msg: M) -> M {
    self.world.dispatch(target, msg)
  }

  fn received_message<M: Message>(&self, entity: Entity) -> bool {
    self.world.received_message::<M>(entity)
  }
}

impl<'w> AccessEntityStats for CallbackWorldAccess<'w> {
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

impl<'w> AccessQuery for CallbackWorldAccess<'w> {
  fn query<'c, Q: Query<'c>>(&'c self, interrogatee: Entity) -> Option<Q::Response> {
    self.world.query::<Q>(interrogatee)
  }
}

impl<'w> AccessResources for CallbackWorldAccess<'w> {
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
