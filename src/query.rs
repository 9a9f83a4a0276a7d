//! Lightweight typed component access, cheaper than threading a message
//! through the dispatch chain just to read or write one component (spec
//! §11, supplementing the message model with direct access).
//!
//! `Query` is implemented for `&C` and `&mut C` for any [`Component`]
//! `C`, for `Option<Q>` (always succeeds, `None` if the inner query
//! would have failed), and for tuples of up to ten queries (AND them
//! together; nest tuples if you need more).

use std::marker::PhantomData;
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;

/// Something that can be used to read or write components off an entity
/// through [`World::query`](crate::world::World::query).
///
/// Returns `Some` when every piece of the query succeeds, `None`
/// otherwise. The `'c` lifetime is the lifetime of the returned
/// component references.
pub trait Query<'c> {
  type Response: 'c;

  #[doc(hidden)]
  fn query(entity: Entity, world: &'c World) -> Option<Self::Response>;
}

impl<'c, C: Component> Query<'c> for &'c C {
  type Response = ReadQueryResponse<'c, C>;

  fn query(entity: Entity, world: &'c World) -> Option<Self::Response> {
    let id = world.registry_try_id_of::<C>()?;
    let data = world.entity_data(entity)?;
    let entry = data.components.get(&id)?;
    let lock = entry.try_read().unwrap_or_else(|_| {
      panic!("{:?} had a component of type {} read-queried while it was mutably borrowed", entity, std::any::type_name::<C>())
    });
    Some(ReadQueryResponse(lock, PhantomData))
  }
}

impl<'c, C: Component> Query<'c> for &'c mut C {
  type Response = WriteQueryResponse<'c, C>;

  fn query(entity: Entity, world: &'c World) -> Option<Self::Response> {
    let id = world.registry_try_id_of::<C>()?;
    let data = world.entity_data(entity)?;
    let entry = data.components.get(&id)?;
    let lock = entry.try_write().unwrap_or_else(|_| {
      panic!("{:?} had a component of type {} write-queried while it was borrowed", entity, std::any::type_name::<C>())
    });
    Some(WriteQueryResponse(lock, PhantomData))
  }
}

impl<'c, Q: Query<'c>> Query<'c> for Option<Q> {
  type Response = Option<Q::Response>;

  fn query(entity: Entity, world: &'c World) -> Option<Self::Response> {
    Some(Q::query(entity, world))
  }
}

macro_rules! impl_query {
  ($($subquery:ident),*) => {
    #[allow(non_snake_case)]
    impl<'c, $($subquery,)*> Query<'c> for ($($subquery,)*)
    where
      $($subquery: Query<'c>,)*
    {
      type Response = ($(<$subquery as Query<'c>>::Response,)*);

      fn query(entity: Entity, world: &'c World) -> Option<Self::Response> {
        Some(($($subquery::query(entity, world)?,)*))
      }
    }
  };
}

impl_query!(A);
impl_query!(A, B);
impl_query!(A, B, C);
impl_query!(A, B, C, D);
impl_query!(A, B, C, D, E);
impl_query!(A, B, C, D, E, F);
impl_query!(A, B, C, D, E, F, G);
impl_query!(A, B, C, D, E, F, G, H);
impl_query!(A, B, C, D, E, F, G, H, I);
impl_query!(A, B, C, D, E, F, G, H, I, J);

/// Wrapper returned when querying `&C`.
pub struct ReadQueryResponse<'a, C>(RwLockReadGuard<'a, Box<dyn Component>>, PhantomData<&'a C>);

impl<C: 'static> std::ops::Deref for ReadQueryResponse<'_, C> {
  type Target = C;

  fn deref(&self) -> &Self::Target {
    // SAFETY: the registry id used to find this entry is C's own id.
    unsafe { self.0.downcast_ref().unwrap_unchecked() }
  }
}

impl<C: 'static> AsRef<C> for ReadQueryResponse<'_, C> {
  fn as_ref(&self) -> &C {
    self
  }
}

/// Wrapper returned when querying `&mut C`.
pub struct WriteQueryResponse<'a, C>(RwLockWriteGuard<'a, Box<dyn Component>>, PhantomData<&'a mut C>);

impl<C: 'static> std::ops::Deref for WriteQueryResponse<'_, C> {
  type Target = C;

  fn deref(&self) -> &Self::Target {
    // SAFETY: the registry id used to find this entry is C's own id.
    unsafe { self.0.downcast_ref().unwrap_unchecked() }
  }
}

impl<C: 'static> std::ops::DerefMut for WriteQueryResponse<'_, C> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    // SAFETY: the registry id used to find this entry is C's own id.
    unsafe { self.0.downcast_mut().unwrap_unchecked() }
  }
}
