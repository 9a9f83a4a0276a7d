//! Process-local bijection between component/message types and small
//! dense integer ids (spec §4.1).
//!
//! A single `u32` per component lets [`Context`](crate::context::Context)
//! and entity storage treat component membership as a sorted id rather
//! than juggling `TypeId`s everywhere. The three framework-known
//! *carrier interfaces* -- state-machine, interactive, transform -- each
//! get one reserved id, and every concrete type that implements one of
//! them collapses onto that id instead of getting a fresh one. That's
//! what lets a context filter for "any state-machine component" without
//! enumerating every concrete state-machine type in the game.

use std::sync::{Mutex, OnceLock};

use ahash::AHashMap;

use crate::component::Component;
use crate::message::Message;
use crate::TypeIdWrapper;

/// A dense id assigned to a component or message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
  /// The reserved id every [`StateMachineCarrier`](crate::state_machine::StateMachineCarrier)
  /// implementor collapses onto.
  pub const STATE_MACHINE: ComponentId = ComponentId(0);
  /// The reserved id every [`InteractiveCarrier`](crate::interaction::InteractiveCarrier)
  /// implementor collapses onto.
  pub const INTERACTIVE: ComponentId = ComponentId(1);
  /// The reserved id every parent-relative (transform) component collapses onto.
  pub const TRANSFORM: ComponentId = ComponentId(2);

  const RESERVED_COUNT: u32 = 3;
}

/// Which of the three framework carrier interfaces a component
/// implements, if any. See [`Component::CARRIER_KIND`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierKind {
  StateMachine,
  Interactive,
  Transform,
}

impl CarrierKind {
  fn reserved_id(self) -> ComponentId {
    match self {
      CarrierKind::StateMachine => ComponentId::STATE_MACHINE,
      CarrierKind::Interactive => ComponentId::INTERACTIVE,
      CarrierKind::Transform => ComponentId::TRANSFORM,
    }
  }
}

/// The process-wide id table every [`ComponentRegistry`] draws from. A
/// type's id must be the same no matter which `World` -- or none at all --
/// first asks for it, so that a [`ContextId`](crate::context::ContextId)
/// computed before a `World` exists still matches the one that `World`
/// derives later. See [`component_id_of`].
struct GlobalIds {
  ids: AHashMap<TypeIdWrapper, ComponentId>,
  next_index: u32,
}

impl GlobalIds {
  fn id_for(&mut self, tid: TypeIdWrapper, carrier: Option<CarrierKind>) -> ComponentId {
    if let Some(&id) = self.ids.get(&tid) {
      return id;
    }
    let id = match carrier {
      Some(kind) => kind.reserved_id(),
      None => {
        let id = ComponentId(self.next_index);
        self.next_index += 1;
        id
      }
    };
    self.ids.insert(tid, id);
    id
  }
}

fn global_ids() -> &'static Mutex<GlobalIds> {
  static GLOBAL: OnceLock<Mutex<GlobalIds>> = OnceLock::new();
  GLOBAL.get_or_init(|| {
    Mutex::new(GlobalIds {
      ids: AHashMap::new(),
      next_index: ComponentId::RESERVED_COUNT,
    })
  })
}

/// The [`ComponentId`] `C` has, or will get, in any [`World`](crate::world::World)
/// in this process -- without needing a live `World` to ask. Every
/// `ComponentRegistry` shares this one id table, so a caller can mint a
/// component's id up front (e.g. to build a
/// [`FilterClause`](crate::context::FilterClause) and pre-compute its
/// [`ContextId`](crate::context::ContextId) for a
/// [`SystemKind::Reactive`](crate::system::SystemKind::Reactive) system)
/// before building the `World` that system will run on, and still have it
/// line up once that `World` registers the same type.
pub fn component_id_of<C: Component>() -> ComponentId {
  global_ids().lock().expect("component id table poisoned").id_for(TypeIdWrapper::of::<C>(), C::carrier_kind())
}

/// The [`ComponentId`] a message type has, or will get. Messages and
/// components share the same global id table (§4.1), so a message type
/// never collides with a component type's id and a [`SystemDescriptor`](crate::system::SystemDescriptor)
/// can declare interest in a message type before any `World` exists, the
/// same way [`component_id_of`] lets a `Reactive` system pre-compute its
/// [`ContextId`](crate::context::ContextId).
pub fn message_id_of<M: Message>() -> ComponentId {
  message_id_of_dyn(TypeIdWrapper::of::<M>())
}

pub(crate) fn message_id_of_dyn(tid: TypeIdWrapper) -> ComponentId {
  global_ids().lock().expect("component id table poisoned").id_for(tid, None)
}

#[derive(Default)]
pub struct ComponentRegistry {
  ids: AHashMap<TypeIdWrapper, ComponentId>,
  /// id -> name, kept in diagnostic builds and in `Debug` output; cheap
  /// enough to just always keep since it's one `&'static str` per type.
  names: AHashMap<ComponentId, &'static str>,
  parent_relative: ahash::AHashSet<ComponentId>,
  /// Types registered explicitly through [`ComponentRegistry::register`],
  /// as opposed to ids assigned lazily through [`ComponentRegistry::id_of`]
  /// for a type nobody ever called `register` on. [`Self::components_under`]
  /// only walks this table.
  static_table: Vec<(TypeIdWrapper, ComponentId)>,
}

impl ComponentRegistry {
  pub fn new() -> Self {
    Self {
      ids: AHashMap::new(),
      names: AHashMap::new(),
      parent_relative: ahash::AHashSet::new(),
      static_table: Vec::new(),
    }
  }

  /// Look up the id for `C`, assigning one lazily on first sight.
  ///
  /// If `C` is not itself one of the carrier interfaces but implements
  /// one (state-machine, interactive, transform), it's aliased to that
  /// interface's reserved id instead of getting a fresh index. Idempotent:
  /// calling this twice for the same type returns the same id both times.
  pub fn id_of<C: Component>(&mut self) -> ComponentId {
    self.id_of_dyn(TypeIdWrapper::of::<C>(), C::carrier_kind(), C::parent_relative())
  }

  pub(crate) fn id_of_dyn(
    &mut self,
    tid: TypeIdWrapper,
    carrier: Option<CarrierKind>,
    parent_relative: bool,
  ) -> ComponentId {
    if let Some(&id) = self.ids.get(&tid) {
      return id;
    }

    let id = global_ids().lock().expect("component id table poisoned").id_for(tid, carrier);

    self.ids.insert(tid, id);
    self.names.entry(id).or_insert(tid.type_name);
    if parent_relative {
      self.parent_relative.insert(id);
    }

    tracing::debug!(component = tid.type_name, id = id.0, "assigned component id");
    id
  }

  /// Register `C` explicitly. This is what [`World::register_component`]
  /// calls, and it's the entry that shows up in [`Self::components_under`].
  pub fn register<C: Component>(&mut self) -> ComponentId {
    let tid = TypeIdWrapper::of::<C>();
    let id = self.id_of::<C>();
    if !self.static_table.iter().any(|(t, _)| *t == tid) {
      self.static_table.push((tid, id));
    }
    id
  }

  /// Is `id` in the "parent-relative" set -- the transform carrier id, or
  /// any user type that declared [`Component::PARENT_RELATIVE`]?
  pub fn is_relative(&self, id: ComponentId) -> bool {
    id == ComponentId::TRANSFORM || self.parent_relative.contains(&id)
  }

  /// Walk the statically registered table for every type whose id collapsed
  /// onto `interface`'s reserved id.
  pub fn components_under(
    &self,
    interface: CarrierKind,
  ) -> impl Iterator<Item = (TypeIdWrapper, ComponentId)> + '_ {
    let reserved = interface.reserved_id();
    self
      .static_table
      .iter()
      .copied()
      .filter(move |(_, id)| *id == reserved)
  }

  pub(crate) fn name_of(&self, id: ComponentId) -> &'static str {
    self.names.get(&id).copied().unwrap_or("<unknown>")
  }

  /// Has this particular registry ever assigned or seen `id`? True for
  /// the three reserved carrier ids regardless. Used to warn when a
  /// context is registered against a [`ComponentId`] minted out of band
  /// via [`component_id_of`] for a type this `World` never itself
  /// registered.
  pub(crate) fn is_known(&self, id: ComponentId) -> bool {
    id.0 < ComponentId::RESERVED_COUNT || self.names.contains_key(&id)
  }

  pub(crate) fn is_registered(&self, tid: TypeIdWrapper) -> bool {
    self.ids.contains_key(&tid)
  }

  /// Look up the id already assigned to `C`, without assigning one if it
  /// hasn't been seen. Used by [`Query`](crate::query::Query) impls, which
  /// only have `&World` to work with.
  pub(crate) fn try_id_of<C: Component>(&self) -> Option<ComponentId> {
    self.ids.get(&TypeIdWrapper::of::<C>()).copied()
  }

  /// Same as [`Self::try_id_of`], but keyed off an already-erased type id --
  /// needed wherever a `Box<dyn Component>` shows up without its concrete
  /// type in scope, e.g. bulk replace.
  pub(crate) fn try_id_of_dyn(&self, tid: TypeIdWrapper) -> Option<ComponentId> {
    self.ids.get(&tid).copied()
  }
}
