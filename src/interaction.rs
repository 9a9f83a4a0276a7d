//! Synchronous interact effects (spec §4.7).
//!
//! An interactive component owns an effect object and one operation;
//! unlike message dispatch, `interact` isn't threaded through every
//! component on the entity -- it's a direct call to the one effect the
//! carrier owns, free to mutate either entity involved. Event ordering
//! (spec §5) guarantees watchers only see the result once `interact`
//! returns and the caller's current statement finishes.

use ahash::AHashMap;
use downcast::Any;

use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;
use crate::TypeIdWrapper;

/// An effect applied when something interacts with its owner.
pub trait Interactive: 'static {
  /// Apply the effect. `interacted` is the entity interacted with, if the
  /// interaction has one beyond the owner itself.
  fn interact(&mut self, world: &mut World, owner: Entity, interactor: Entity, interacted: Option<Entity>);
}

/// Implemented by a component that owns an [`Interactive`] effect,
/// opting it into the framework's interactive carrier interface -- its
/// registry id collapses onto [`ComponentId::INTERACTIVE`](crate::registry::ComponentId::INTERACTIVE).
pub trait InteractiveCarrier: Component {
  fn effect(&mut self) -> &mut dyn Interactive;
}

pub(crate) type InteractiveAccessor = fn(&mut dyn Component) -> &mut dyn Interactive;

#[derive(Default)]
pub(crate) struct InteractiveAccessTable {
  accessors: AHashMap<TypeIdWrapper, InteractiveAccessor>,
}

impl InteractiveAccessTable {
  pub(crate) fn register<C: InteractiveCarrier>(&mut self) {
    self.accessors.insert(TypeIdWrapper::of::<C>(), |component| {
      // SAFETY: only ever invoked with the concrete type that registered this accessor.
      let concrete: &mut C = unsafe { component.downcast_mut().unwrap_unchecked() };
      concrete.effect()
    });
  }

  pub(crate) fn accessor_for(&self, tid: TypeIdWrapper) -> Option<InteractiveAccessor> {
    self.accessors.get(&tid).copied()
  }
}
