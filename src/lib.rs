#![doc = include_str!("../README.md")]

pub mod access;
pub mod builder;
mod callback;
pub mod component;
pub mod context;
pub mod diagnostics;
pub mod entity;
pub mod error;
pub mod interaction;
pub mod message;
pub mod query;
pub mod registry;
pub mod resource;
pub mod state_machine;
pub mod system;
pub mod watcher;
pub mod world;

use std::any::{self, TypeId};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use downcast::Any;

/// A [`TypeId`] with its human-readable name stapled on for diagnostics.
///
/// Everywhere in this crate that needs to key a map off of a Rust type --
/// the component registry, message handler tables, the context cache --
/// uses this instead of a bare `TypeId` so panics and trace logs can name
/// the offending type.
#[derive(Clone, Copy)]
pub(crate) struct TypeIdWrapper {
  tid: TypeId,
  pub(crate) type_name: &'static str,
}

impl std::ops::Deref for TypeIdWrapper {
  type Target = TypeId;

  fn deref(&self) -> &Self::Target {
    &self.tid
  }
}

impl TypeIdWrapper {
  pub fn of<T: 'static>() -> Self {
    Self {
      tid: TypeId::of::<T>(),
      type_name: any::type_name::<T>(),
    }
  }
}

impl PartialEq for TypeIdWrapper {
  fn eq(&self, other: &Self) -> bool {
    self.tid == other.tid
  }
}

impl Eq for TypeIdWrapper {}

impl PartialOrd for TypeIdWrapper {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TypeIdWrapper {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.tid.cmp(&other.tid)
  }
}

impl Hash for TypeIdWrapper {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.tid.hash(state);
  }
}

impl Debug for TypeIdWrapper {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut dbs = f.debug_tuple("TypeIdWrapper");
    dbs.field(&self.type_name);
    dbs.finish()
  }
}

pub(crate) trait ToTypeIdWrapper {
  fn type_id_wrapper(&self) -> TypeIdWrapper;
}

impl<T: Any + ?Sized> ToTypeIdWrapper for T {
  fn type_id_wrapper(&self) -> TypeIdWrapper {
    TypeIdWrapper {
      tid: self.type_id(),
      type_name: self.type_name(),
    }
  }
}

/// Panics pointing at a component that was re-entrantly locked, almost
/// always because a message handler sent a message back to one of its
/// own already-borrowed components.
pub(crate) fn loop_panic(perpetrator: entity::Entity, component: TypeIdWrapper) -> ! {
  panic!(
    "{:?} sent a message to its own component of type {} while that component was still borrowed -- \
     this is almost always a loop of messages through a handler; check the stack trace",
    perpetrator, component.type_name
  )
}

pub mod prelude {
  pub use crate::access::{AccessDispatcher, AccessEntityStats, AccessQuery, AccessResources};
  pub use crate::builder::{EntityBuilder, WorldBuilder};
  pub use crate::callback::CallbackWorldAccess;
  pub use crate::component::{Component, HandlerBuilder};
  pub use crate::context::{Access, ClauseKind, ContextId, FilterClause};
  pub use crate::entity::{Entity, EntityLiveness};
  pub use crate::error::{ConfigurationError, FilterError, InvariantViolation};
  pub use crate::interaction::{Interactive, InteractiveCarrier};
  pub use crate::message::{ListenerAccess, Message, MsgHandlerRead, MsgHandlerWrite};
  pub use crate::query::Query;
  pub use crate::registry::{component_id_of, message_id_of, ComponentId};
  pub use crate::resource::{ReadResource, Resource, ResourceLookupError, WriteResource};
  pub use crate::state_machine::{Routine, StateMachine, StateMachineCarrier, WaitDirective};
  pub use crate::system::{PauseBehavior, System, SystemDescriptor, SystemKind};
  pub use crate::watcher::{NotificationBatch, NotificationKind};
  pub use crate::world::World;

  #[cfg(feature = "derive")]
  pub use ecflow_macros::{Component, Message};
}
