//! Data attachable to an [`Entity`](crate::entity::Entity) (spec §3, §4.1's
//! carrier-interface collapsing, §4.2).
//!
//! Components come in the variants spec §3 names -- plain, modifiable,
//! state-machine carrier, interactive carrier, transform/parent-relative,
//! message -- but in Rust that's expressed as one dyn-compatible
//! `Component` trait plus a handful of default *static* methods (not
//! associated consts, so `dyn Component` stays usable) that a concrete
//! type overrides to opt into a variant's behavior. `register_handlers`
//! is how a component declares which message types it listens to, read-
//! or write-handed, mirroring how [`Message`](crate::message::Message)
//! dispatch walks an entity's components in order.

use std::any;
use std::collections::BTreeMap;

use downcast::{downcast, Any};

use crate::callback::{CallbackWorldAccess, Callbacks, OnCreateCallback, OnRemoveCallback};
use crate::entity::Entity;
use crate::message::{ListenerAccess, Message, MsgHandlerInner, MsgHandlerRead, MsgHandlerWrite};
use crate::registry::CarrierKind;
use crate::TypeIdWrapper;

/// Something attached to an [`Entity`] that gives it its behavior.
///
/// The handful of `where Self: Sized` static methods below are metadata,
/// not behavior: they're read once, at
/// [`World::register_component`](crate::world::World::register_component)
/// time, to decide the type's registry id and bulk-replace behavior.
/// They carry a `Self: Sized` bound specifically so `dyn Component`
/// remains a valid trait object (associated *consts* would have broken
/// that; these are plain functions instead).
pub trait Component: Any {
  /// Register what message types this listens to and what it does with them.
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self>
  where
    Self: Sized,
  {
    builder
  }

  /// Which framework carrier interface this component collapses onto in
  /// the registry, if any. Returning `Some` here is what lets a context
  /// filter for "any state-machine component" without enumerating every
  /// concrete implementor.
  fn carrier_kind() -> Option<CarrierKind>
  where
    Self: Sized,
  {
    None
  }

  /// Whether this component's value is interpreted relative to a parent
  /// entity (the "parent-relative" marker, spec §4.1).
  fn parent_relative() -> bool
  where
    Self: Sized,
  {
    false
  }

  /// If `true`, [`World::replace_components`](crate::world::World::replace_components)
  /// preserves this component when present on the target instead of
  /// overwriting or dropping it.
  fn keep_on_replace() -> bool
  where
    Self: Sized,
  {
    false
  }

  /// Diagnostic-only marker: at most one entity in the world should ever
  /// carry this component. Not enforced at runtime; see spec §6.
  fn unique() -> bool
  where
    Self: Sized,
  {
    false
  }

  /// Metadata bit for a host serializer: should this component's fields
  /// be included when persisting the entity? Serialization itself is out
  /// of this crate's scope (spec §1); this is just the marker.
  fn persistable() -> bool
  where
    Self: Sized,
  {
    true
  }

  /// Human-readable name, defaulting to the last path segment of
  /// [`std::any::type_name`].
  fn friendly_name() -> &'static str
  where
    Self: Sized,
  {
    any::type_name::<Self>()
      .rsplit("::")
      .next()
      .expect("type_name is never empty")
  }
}
downcast!(dyn Component);

/// Builder that registers message handlers and spawn/destroy callbacks for
/// a component type. Passed through [`Component::register_handlers`].
#[must_use = "does nothing until the world consumes it at registration time"]
pub struct HandlerBuilder<C: Component + ?Sized> {
  pub(crate) handlers: BTreeMap<TypeIdWrapper, MsgHandlerInner>,
  pub(crate) create_cb: Option<OnCreateCallback>,
  pub(crate) remove_cb: Option<OnRemoveCallback>,
  phantom: std::marker::PhantomData<C>,
}

impl<C: Component> HandlerBuilder<C> {
  pub(crate) fn new() -> Self {
    Self {
      handlers: BTreeMap::new(),
      create_cb: None,
      remove_cb: None,
      phantom: std::marker::PhantomData,
    }
  }

  /// Handle the given message type with read-only access to this component.
  pub fn handle_read<M: Message>(mut self, handler: MsgHandlerRead<C, M>) -> Self {
    let tid = TypeIdWrapper::of::<M>();
    if self.handlers.contains_key(&tid) {
      panic!(
        "already registered message type {:?} to component type {:?}",
        tid.type_name,
        TypeIdWrapper::of::<C>().type_name
      );
    }

    let clo = move |component: &dyn Component, event: Box<dyn Message>, entity: Entity, access: &ListenerAccess| {
      // SAFETY: only ever invoked with the concrete type that registered this handler.
      let component: &C = unsafe { component.downcast_ref().unwrap_unchecked() };
      // SAFETY: the message's type id was checked by the caller before dispatching here.
      let event: Box<M> = unsafe { event.downcast().unwrap_unchecked() };
      let res = handler(component, *event, entity, access);
      Box::new(res) as _
    };
    self.handlers.insert(tid, MsgHandlerInner::Read(Box::new(clo)));
    self
  }

  /// Handle the given message type with mutable access to this component.
  pub fn handle_write<M: Message>(mut self, handler: MsgHandlerWrite<C, M>) -> Self {
    let tid = TypeIdWrapper::of::<M>();
    if self.handlers.contains_key(&tid) {
      panic!(
        "already registered message type {:?} to component type {:?}",
        tid.type_name,
        TypeIdWrapper::of::<C>().type_name
      );
    }
    let clo = move |component: &mut dyn Component, event: Box<dyn Message>, entity: Entity, access: &ListenerAccess| {
      // SAFETY: only ever invoked with the concrete type that registered this handler.
      let component: &mut C = unsafe { component.downcast_mut().unwrap_unchecked() };
      // SAFETY: the message's type id was checked by the caller before dispatching here.
      let event: Box<M> = unsafe { event.downcast().unwrap_unchecked() };
      let res = handler(component, *event, entity, access);
      Box::new(res) as _
    };
    self.handlers.insert(tid, MsgHandlerInner::Write(Box::new(clo)));
    self
  }

  /// Run `cb` the first time an instance of this component type is attached
  /// to a live entity.
  pub fn on_create(mut self, cb: fn(&C, Entity, &CallbackWorldAccess)) -> Self {
    if self.create_cb.is_some() {
      panic!("a create callback for {:?} already exists", any::type_name::<C>());
    }
    let clo = move |comp: &dyn Component, e: Entity, access: &CallbackWorldAccess| {
      // SAFETY: only ever invoked with the concrete type that registered this handler.
      let concrete: &C = unsafe { comp.downcast_ref().unwrap_unchecked() };
      cb(concrete, e, access);
    };
    self.create_cb = Some(Box::new(clo));
    self
  }

  /// Run `cb` after an instance of this component type is removed (including
  /// via entity destruction). The entity passed in is always dead by then.
  pub fn on_remove(mut self, cb: fn(C, Entity, &CallbackWorldAccess)) -> Self {
    if self.remove_cb.is_some() {
      panic!("a remove callback for {:?} already exists", any::type_name::<C>());
    }
    let clo = move |comp: Box<dyn Component>, e: Entity, access: &CallbackWorldAccess| {
      // SAFETY: only ever invoked with the concrete type that registered this handler.
      let concrete: C = unsafe { *comp.downcast().unwrap_unchecked() };
      cb(concrete, e, access);
    };
    self.remove_cb = Some(Box::new(clo));
    self
  }

  pub(crate) fn into_vtable(self) -> ComponentVtable {
    let callbacks = match (self.create_cb, self.remove_cb) {
      (None, None) => None,
      (None, Some(remove)) => Some(Callbacks::Remove(remove)),
      (Some(create), None) => Some(Callbacks::Create(create)),
      (Some(create), Some(remove)) => Some(Callbacks::Both(create, remove)),
    };

    ComponentVtable {
      tid: TypeIdWrapper::of::<C>(),
      friendly_name: C::friendly_name(),
      msg_table: self.handlers,
      callbacks,
      keep_on_replace: C::keep_on_replace(),
    }
  }
}

/// Everything the world needs to know about a registered component type
/// once its concrete `C` has been erased: its message handler table, its
/// spawn/destroy callbacks, and the one `keep_on_replace` bit that
/// [`World::replace_components`](crate::world::World::replace_components)
/// checks before dropping an existing component.
pub(crate) struct ComponentVtable {
  pub(crate) tid: TypeIdWrapper,
  pub(crate) friendly_name: &'static str,
  pub(crate) msg_table: BTreeMap<TypeIdWrapper, MsgHandlerInner>,
  pub(crate) callbacks: Option<Callbacks>,
  pub(crate) keep_on_replace: bool,
}
