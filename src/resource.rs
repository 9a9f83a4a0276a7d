//! Singleton data attached to a [`World`](crate::world::World) (spec §11,
//! supplementing the component/entity model with the "one instance per
//! world" storage every non-trivial host needs -- asset tables, save
//! data, a position cache).

use std::collections::BTreeMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use downcast::{downcast, Any};

use crate::TypeIdWrapper;

/// Singleton data attached to a world. At most one instance of a given
/// `Resource` type exists per world -- handy for things that wouldn't
/// make sense to have more than one of: asset tables, settings, save
/// data, a spatial cache.
pub trait Resource: Any {}
downcast!(dyn Resource);

#[derive(Default)]
pub(crate) struct ResourceMap {
  map: BTreeMap<TypeIdWrapper, RwLock<Box<dyn Resource>>>,
}

impl ResourceMap {
  pub(crate) fn read<T: Resource>(&self) -> Result<ReadResource<'_, T>, ResourceLookupError> {
    let tid = TypeIdWrapper::of::<T>();
    let result = 'try_at_home: {
      let Some(resource) = self.map.get(&tid) else {
        break 'try_at_home Err(ResourceLookupErrorKind::NotFound);
      };
      let lock = match resource.try_read() {
        Ok(it) => it,
        Err(TryLockError::WouldBlock) => break 'try_at_home Err(ResourceLookupErrorKind::Locked),
        Err(TryLockError::Poisoned(_)) => break 'try_at_home Err(ResourceLookupErrorKind::Poisoned),
      };
      Ok(ReadResource(lock, PhantomData))
    };
    result.map_err(|kind| ResourceLookupError { tid, kind })
  }

  pub(crate) fn write<T: Resource>(&self) -> Result<WriteResource<'_, T>, ResourceLookupError> {
    let tid = TypeIdWrapper::of::<T>();
    let result = 'try_at_home: {
      let Some(resource) = self.map.get(&tid) else {
        break 'try_at_home Err(ResourceLookupErrorKind::NotFound);
      };
      let lock = match resource.try_write() {
        Ok(it) => it,
        Err(TryLockError::WouldBlock) => break 'try_at_home Err(ResourceLookupErrorKind::Locked),
        Err(TryLockError::Poisoned(_)) => break 'try_at_home Err(ResourceLookupErrorKind::Poisoned),
      };
      Ok(WriteResource(lock, PhantomData))
    };
    result.map_err(|kind| ResourceLookupError { tid, kind })
  }

  pub(crate) fn insert<T: Resource>(&mut self, resource: T) -> Option<T> {
    self
      .map
      .insert(TypeIdWrapper::of::<T>(), RwLock::new(Box::new(resource) as _))
      .map(|old| *old.into_inner().expect("no other reference to a resource outlives the world").downcast().unwrap())
  }

  pub(crate) fn contains<T: Resource>(&self) -> bool {
    self.map.contains_key(&TypeIdWrapper::of::<T>())
  }
}

/// Opaque wrapper for a shared reference to a resource.
pub struct ReadResource<'a, T: ?Sized>(RwLockReadGuard<'a, Box<dyn Resource>>, PhantomData<T>);
impl<'a, T: Resource> Deref for ReadResource<'a, T> {
  type Target = T;

  fn deref(&self) -> &Self::Target {
    self.0.downcast_ref().expect("keyed by TypeIdWrapper, so the concrete type always matches")
  }
}

/// Opaque wrapper for an exclusive reference to a resource.
pub struct WriteResource<'a, T: ?Sized>(RwLockWriteGuard<'a, Box<dyn Resource>>, PhantomData<T>);
impl<'a, T: Resource> Deref for WriteResource<'a, T> {
  type Target = T;

  fn deref(&self) -> &Self::Target {
    self.0.downcast_ref().expect("keyed by TypeIdWrapper, so the concrete type always matches")
  }
}
impl<'a, T: Resource> DerefMut for WriteResource<'a, T> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.0.downcast_mut().expect("keyed by TypeIdWrapper, so the concrete type always matches")
  }
}

/// Problem encountered trying to read or write a resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLookupError {
  pub tid: TypeIdWrapper,
  pub kind: ResourceLookupErrorKind,
}

/// Problems when trying to get a resource from a world.
#[derive(Debug, Clone, Copy)]
pub enum ResourceLookupErrorKind {
  NotFound,
  /// Either there's already a shared reference to that resource and you
  /// asked for an exclusive one, or there's already an exclusive
  /// reference and you asked for either kind.
  Locked,
  /// The lock was poisoned; something panicked while it was held.
  Poisoned,
}

impl Display for ResourceLookupError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self.kind {
      ResourceLookupErrorKind::NotFound => write!(f, "a resource of type {} was not found", &self.tid.type_name),
      ResourceLookupErrorKind::Locked => write!(f, "the resource of type {} was found, but it was borrowed in such a way it could not be reborrowed", &self.tid.type_name),
      ResourceLookupErrorKind::Poisoned => write!(f, "the resource of type {} was found, but its lock was poisoned", &self.tid.type_name),
    }
  }
}

impl std::error::Error for ResourceLookupError {}
