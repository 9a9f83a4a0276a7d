//! Error taxonomy (see spec §7).
//!
//! Only the *configuration error* class -- problems detectable at world
//! construction, before any entity exists -- is returned as a `Result`.
//! Invariant violations (operating on a destroyed entity, double-adding
//! a component id, registering the same system twice) are bugs, not
//! recoverable conditions, and panic instead; [`InvariantViolation`]
//! exists only to give those panics a consistent, greppable message.

use thiserror::Error;

use crate::TypeIdWrapper;

/// Problems detected while building a [`World`](crate::world::World),
/// before the first frame runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
  #[error("system type {0:?} was added to the world more than once")]
  DuplicateSystem(&'static str),

  #[error(
    "system {system:?} requires {required:?} to run first, but {required:?} was not registered \
     anywhere earlier in the system list"
  )]
  UnsatisfiedRequires {
    system: &'static str,
    required: &'static str,
  },

  #[error("the system ordering has a cycle involving {0:?}")]
  CyclicOrdering(&'static str),

  #[error("component type {0} was used in a filter or on a spawned entity but never registered")]
  MissingComponentRegistration(&'static str),
}

/// A filter or context that can never match any entity -- e.g. a
/// `none_of` clause that names every component an `all_of` clause also
/// names. Not an error per §7: a filter matching nothing is legal, it
/// just never fires. This type exists so callers who want to surface
/// that as a warning have something to construct and `warn!` about;
/// nothing in the crate ever returns it as an `Err`.
#[derive(Debug, Clone, Copy, Error)]
#[error("filter can never match any entity")]
pub struct FilterError;

/// A bug, not a recoverable condition. Constructing one of these and
/// immediately panicking with its `Display` gives every invariant
/// violation in the crate the same shape of message.
#[derive(Debug, Error)]
pub enum InvariantViolation {
  #[error("operated on {0:?}, which has already been destroyed")]
  EntityDestroyed(crate::entity::Entity),

  #[error("{entity:?} already has a component of type {ty}")]
  DuplicateComponent {
    entity: crate::entity::Entity,
    ty: &'static str,
  },
}

impl InvariantViolation {
  pub(crate) fn panic(self) -> ! {
    panic!("{self}")
  }
}

pub(crate) fn missing_registration(tid: TypeIdWrapper) -> ! {
  panic!(
    "tried to use component type {} before it was registered with the world",
    tid.type_name
  )
}
