//! The place all the entities, resources, and components live, at the
//! heart of your project (spec §4.5).
//!
//! `World` is the god-object an entity-component-system runtime centers
//! on, generalized here to additionally own the context table, the
//! watcher table and its "has pending work" set, and the carrier-accessor
//! tables the state-machine and interaction runtimes need. Structural
//! mutation (add/remove/replace/activate/deactivate/destroy/spawn) takes
//! `&mut World`; message dispatch takes `&World` and relies on each
//! component's own `RwLock` for interior mutability, keeping entity
//! storage split into an allocator and a per-entity-data map with
//! per-component locks.

use std::collections::BTreeMap;
use std::sync::RwLock;

use ahash::{AHashMap, AHashSet};
use crossbeam::channel;
use generational_arena::Arena;
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::access::{AccessDispatcher, AccessEntityStats, AccessQuery, AccessResources};
use crate::callback::{CallbackWorldAccess, Callbacks};
use crate::component::{Component, ComponentVtable, HandlerBuilder};
use crate::context::{ClauseKind, ContextTable, FilterClause};
use crate::entity::{ComponentEntry, Entity, EntityData, EntityIter, EntityLiveness};
use crate::error::InvariantViolation;
use crate::interaction::{InteractiveAccessTable, InteractiveCarrier};
use crate::message::{ListenerAccess, Message, MsgHandlerInner};
use crate::query::Query;
use crate::registry::{self, ComponentId, ComponentRegistry};
use crate::resource::{ReadResource, Resource, ResourceLookupError, ResourceMap, WriteResource};
use crate::state_machine::{StateMachineAccessTable, StateMachineCarrier};
use crate::system::{PauseBehavior, SystemDescriptor, SystemKind};
use crate::watcher::{ComponentWatcher, NotificationBatch, NotificationKind, WatcherId};
use crate::{loop_panic, ToTypeIdWrapper, TypeIdWrapper};

/// Per-system diagnostics sink: `(system name, elapsed ms, entity count)`.
/// No-op by default; see [`crate::builder::WorldBuilder::with_timing_sink`].
pub type TimingSink = Box<dyn Fn(&str, f64, usize) + Send + Sync>;

pub struct World {
  /// Mints fresh [`Entity`] ids. Kept separate from [`Self::assocs`] so an
  /// id can be reserved through only a shared borrow -- see
  /// [`Self::reserve_entity`].
  allocator: RwLock<Arena<()>>,
  /// The actual per-entity component bags, keyed by the `Entity` the
  /// allocator minted for them rather than by arena position. An entity
  /// present in the allocator but not here yet is
  /// [`EntityLiveness::PartiallySpawned`] -- reserved by
  /// [`ListenerAccess::lazy_spawn`](crate::message::ListenerAccess::lazy_spawn)
  /// but not finished until [`Self::finalize`] runs.
  assocs: AHashMap<Entity, EntityData>,
  pub(crate) registry: ComponentRegistry,
  component_vtables: BTreeMap<TypeIdWrapper, ComponentVtable>,

  pub(crate) contexts: ContextTable,
  watchers: BTreeMap<WatcherId, ComponentWatcher>,
  pending_watchers: std::cell::RefCell<indexmap::IndexSet<WatcherId, ahash::RandomState>>,

  state_machine_accessors: StateMachineAccessTable,
  interactive_accessors: InteractiveAccessTable,

  pub(crate) resources: ResourceMap,

  systems: Vec<SystemDescriptor>,
  paused: bool,
  frame_counter: u64,
  fixed_dt_ms: u32,
  fixed_update_accumulator_ms: u32,
  timing_sink: TimingSink,

  lazy_sender: channel::Sender<LazyUpdate>,
  lazy_channel: channel::Receiver<LazyUpdate>,

  pending_message_resolutions: std::cell::RefCell<Vec<(TypeIdWrapper, Entity)>>,
  deferred_destructions: Vec<Entity>,
}

impl World {
  pub(crate) fn new(systems: Vec<SystemDescriptor>, fixed_dt_ms: u32, start_paused: bool, timing_sink: TimingSink) -> Self {
    let (tx, rx) = channel::unbounded();
    Self {
      allocator: RwLock::new(Arena::new()),
      assocs: AHashMap::new(),
      registry: ComponentRegistry::new(),
      component_vtables: BTreeMap::new(),
      contexts: ContextTable::default(),
      watchers: BTreeMap::new(),
      pending_watchers: std::cell::RefCell::new(indexmap::IndexSet::default()),
      state_machine_accessors: StateMachineAccessTable::default(),
      interactive_accessors: InteractiveAccessTable::default(),
      resources: ResourceMap::default(),
      systems,
      paused: start_paused,
      frame_counter: 0,
      fixed_dt_ms,
      fixed_update_accumulator_ms: 0,
      timing_sink,
      lazy_sender: tx,
      lazy_channel: rx,
      pending_message_resolutions: std::cell::RefCell::new(Vec::new()),
      deferred_destructions: Vec::new(),
    }
  }

  // ---- registration ---------------------------------------------------

  /// Register a component type with the world. Panics if already registered.
  pub fn register_component<C: Component>(&mut self) -> ComponentId {
    let tid = TypeIdWrapper::of::<C>();
    if self.component_vtables.contains_key(&tid) {
      panic!("already registered component type {:?}", tid.type_name);
    }

    let id = self.registry.register::<C>();

    let builder = HandlerBuilder::<C>::new();
    let builder = C::register_handlers(builder);
    let vtable = builder.into_vtable();
    self.component_vtables.insert(tid, vtable);

    debug!(component = tid.type_name, id = id.0, "registered component");
    id
  }

  /// Register a state-machine carrier component, additionally wiring up
  /// its [`StateMachine`](crate::state_machine::StateMachine) accessor.
  pub fn register_state_machine_component<C: StateMachineCarrier>(&mut self) -> ComponentId {
    let id = self.register_component::<C>();
    self.state_machine_accessors.register::<C>();
    id
  }

  /// Register an interactive carrier component, additionally wiring up
  /// its [`Interactive`](crate::interaction::Interactive) effect accessor.
  pub fn register_interactive_component<C: InteractiveCarrier>(&mut self) -> ComponentId {
    let id = self.register_component::<C>();
    self.interactive_accessors.register::<C>();
    id
  }

  /// Register a context (filter signature), returning its canonical id.
  /// Idempotent: two equivalent filters share one context.
  pub fn register_context(&mut self, clauses: &[FilterClause]) -> crate::context::ContextId {
    if clauses.iter().any(|c| c.components.iter().any(|id| !self.registry_has_any(*id))) {
      warn!("context registered with a component id never registered with this world; it can never match");
    }
    if clause_is_unsatisfiable(clauses) {
      warn!(error = %crate::error::FilterError, "context can never match any entity");
    }
    self.contexts.register(clauses)
  }

  /// The entities currently matching a registered context, as a cached,
  /// ref-counted snapshot (spec §4.3). Rebuilt lazily the first time it's
  /// asked for after the context's active set last changed.
  pub fn context_snapshot(&self, context: crate::context::ContextId) -> std::rc::Rc<[Entity]> {
    self.contexts.get(context).snapshot()
  }

  fn registry_has_any(&self, id: ComponentId) -> bool {
    self.registry.is_known(id)
  }

  fn watcher_id_for(&mut self, context: crate::context::ContextId, component: ComponentId) -> WatcherId {
    let key = (context, component);
    self.watchers.entry(key).or_insert_with(|| {
      debug!(?context, component = component.0, "created watcher");
      ComponentWatcher::new(context, component)
    });
    key
  }

  // ---- spawning ---------------------------------------------------------

  /// Mint a fresh `Entity` id without giving it a components bag yet.
  ///
  /// Only needs a shared borrow of the allocator, which is what lets
  /// [`ListenerAccess::lazy_spawn`](crate::message::ListenerAccess::lazy_spawn)
  /// hand back a real, comparable `Entity` from inside a message handler
  /// that only has `&World`. The entity reads as
  /// [`EntityLiveness::PartiallySpawned`] until [`LazyUpdate::SpawnEntity`]
  /// gives it components during [`Self::finalize`].
  pub(crate) fn reserve_entity(&self) -> Entity {
    Entity(self.allocator.write().expect("allocator lock poisoned").insert(()))
  }

  /// Insert a resource into the world, returning the previous instance of
  /// this type if one was already present (spec §11's resource map).
  pub fn insert_resource<R: Resource>(&mut self, resource: R) -> Option<R> {
    self.resources.insert(resource)
  }

  /// [`Self::insert_resource`] with `R::default()`.
  pub fn insert_resource_default<R: Resource + Default>(&mut self) -> Option<R> {
    self.insert_resource(R::default())
  }

  /// Spawn an empty entity, reserving its slot immediately.
  pub fn spawn_empty(&mut self) -> Entity {
    let entity = Entity(self.allocator.get_mut().expect("allocator lock poisoned").insert(()));
    self.assocs.insert(entity, EntityData::empty());
    entity
  }

  /// Spawn an entity carrying a single component.
  pub fn spawn_1<C: Component>(&mut self, component: C) -> Entity {
    let entity = self.spawn_empty();
    self.add_component(entity, component);
    entity
  }

  /// Start a builder for an entity assembled from multiple components,
  /// inserted into the world as soon as `.build()` is called.
  pub fn spawn(&mut self) -> crate::builder::ImmediateEntityBuilder<'_> {
    let entity = self.spawn_empty();
    crate::builder::ImmediateEntityBuilder::new(self, entity)
  }

  // ---- structural mutation ----------------------------------------------

  fn entity_mut(&mut self, entity: Entity) -> &mut EntityData {
    match self.assocs.get_mut(&entity) {
      Some(data) if !data.destroyed => data,
      _ => InvariantViolation::EntityDestroyed(entity).panic(),
    }
  }

  /// Add a component to a live entity. Panics if the entity is destroyed
  /// or already carries a component with this id (spec §4.2 `add`).
  pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) {
    let id = self.registry.id_of::<C>();
    let real_tid = TypeIdWrapper::of::<C>();
    let data = self.entity_mut(entity);
    if data.has(id) {
      InvariantViolation::DuplicateComponent { entity, ty: real_tid.type_name }.panic();
    }
    data.components.insert(id, RwLock::new(Box::new(component) as _));

    self.on_component_added(entity, id, real_tid);
  }

  fn on_component_added(&mut self, entity: Entity, id: ComponentId, real_tid: TypeIdWrapper) {
    self.run_create_callback(entity, real_tid);
    self.route_presence(entity, id, true, false);

    if let Some(accessor) = self.state_machine_accessors.accessor_for(real_tid) {
      let data = self.assocs.get_mut(&entity).expect("just inserted");
      let entry = data.components.get_mut(&id).expect("just inserted");
      let lock = entry.get_mut().expect("exclusive access, not borrowed elsewhere");
      let sm = accessor(&mut **lock);
      sm.initialize(self, entity);
    }
  }

  /// Remove the component with `C`'s registry id from `entity`. Returns
  /// whether one was present; no-op if absent (spec §4.2 `remove`).
  pub fn remove_component<C: Component>(&mut self, entity: Entity) -> bool {
    let id = self.registry.id_of::<C>();
    self.remove_component_by_id(entity, id, false)
  }

  fn remove_component_by_id(&mut self, entity: Entity, id: ComponentId, destroy_caused: bool) -> bool {
    let data = self.entity_mut(entity);
    let Some(entry) = data.components.shift_remove(&id) else { return false };
    let mut boxed = entry.into_inner().expect("exclusive ownership, no outstanding borrow");
    let real_tid = boxed.type_id_wrapper();

    if let Some(accessor) = self.state_machine_accessors.accessor_for(real_tid) {
      accessor(&mut *boxed).on_destroyed();
    }

    self.route_presence(entity, id, false, destroy_caused);
    self.run_remove_callback(entity, real_tid, boxed);
    true
  }

  /// Bulk-replace components on `entity`: each supplied component replaces
  /// an existing one of the same id or is added if absent, except that a
  /// type marked [`Component::keep_on_replace`] is preserved over an
  /// incoming replacement (spec §4.2 `replace`).
  pub fn replace_components(&mut self, entity: Entity, components: Vec<Box<dyn Component>>) {
    for incoming in components {
      let real_tid = incoming.type_id_wrapper();
      let Some(id) = self.registry.try_id_of_dyn(real_tid) else {
        crate::error::missing_registration(real_tid);
      };

      let keep = self.component_vtables.get(&real_tid).map(|v| v.keep_on_replace).unwrap_or(false);
      let data = self.entity_mut(entity);
      if keep && data.has(id) {
        continue;
      }

      let existed = data.components.insert(id, RwLock::new(incoming)).is_some();
      if existed {
        self.route_modify(entity, id);
      } else {
        self.on_component_added(entity, id, real_tid);
      }
    }
  }

  /// Invoke `owner`'s interactive effect directly, bypassing message
  /// dispatch entirely (spec §4.7). No-op if `owner` carries no
  /// interactive carrier component. `interacted` is the second entity
  /// involved, if any, beyond `owner` and `interactor`.
  pub fn interact(&mut self, owner: Entity, interactor: Entity, interacted: Option<Entity>) {
    let Some(data) = self.assocs.get(&owner) else { return };
    let Some(entry) = data.components.get(&ComponentId::INTERACTIVE) else { return };
    let real_tid = {
      let Ok(lock) = entry.try_read() else { return };
      lock.type_id_wrapper()
    };
    let Some(accessor) = self.interactive_accessors.accessor_for(real_tid) else { return };

    // Same detach/reattach as state-machine ticking: `interact` needs
    // `&mut World`, so the component's own lock can't still be held.
    let data = self.assocs.get_mut(&owner).expect("checked above");
    let entry = data.components.get_mut(&ComponentId::INTERACTIVE).expect("checked above");
    let mut boxed = std::mem::replace(entry, RwLock::new(Box::new(NullComponent) as _)).into_inner().expect("exclusive");
    accessor(&mut *boxed).interact(self, owner, interactor, interacted);

    if let Some(data) = self.assocs.get_mut(&owner) {
      if let Some(entry) = data.components.get_mut(&ComponentId::INTERACTIVE) {
        *entry = RwLock::new(boxed);
      }
    }
  }

  /// Toggle `entity`'s active flag on; re-entrant calls are no-ops
  /// (spec §4.2 `activate`).
  pub fn activate(&mut self, entity: Entity) {
    let data = self.entity_mut(entity);
    if data.active {
      return;
    }
    data.active = true;
    self.route_activation(entity, true);
  }

  /// Toggle `entity`'s active flag off; re-entrant calls are no-ops
  /// (spec §4.2 `deactivate`).
  pub fn deactivate(&mut self, entity: Entity) {
    let data = self.entity_mut(entity);
    if !data.active {
      return;
    }
    data.active = false;
    self.route_activation(entity, false);
  }

  /// Destroy an entity immediately: fires removal notifications for every
  /// component in descending id order, then reclaims the slot unless a
  /// watcher still has a pending notification referencing it, in which
  /// case reclamation is deferred to [`Self::finalize`] (spec §4.2 `destroy`).
  pub fn destroy(&mut self, entity: Entity) {
    let data = self.entity_mut(entity);
    if data.destroyed {
      return;
    }
    data.destroyed = true;

    let mut ids: Vec<ComponentId> = data.components.keys().copied().collect();
    ids.sort_by(|a, b| b.0.cmp(&a.0));
    for id in ids {
      self.remove_component_by_id(entity, id, true);
    }

    self.contexts.forget(entity);

    if self.has_pending_notifications_for(entity) {
      self.deferred_destructions.push(entity);
    } else {
      self.reclaim_entity(entity);
    }
  }

  /// Drop an entity's id and data for good -- after this, `entity` is
  /// absent from both the allocator and `assocs`, so it reads back as
  /// [`EntityLiveness::Destroyed`] rather than [`EntityLiveness::PartiallySpawned`].
  fn reclaim_entity(&mut self, entity: Entity) {
    self.assocs.remove(&entity);
    self.allocator.get_mut().expect("allocator lock poisoned").remove(entity.0);
  }

  fn has_pending_notifications_for(&self, _entity: Entity) -> bool {
    // Conservative: defer reclamation whenever *any* watcher has pending
    // work this frame, since per-entity membership in a pending bucket
    // isn't cheap to check without walking every watcher's table. The
    // slot stays addressable (reads back `Destroyed`) either way.
    !self.pending_watchers.borrow().is_empty()
  }

  // ---- event routing -----------------------------------------------------

  fn route_presence(&mut self, entity: Entity, trigger: ComponentId, added: bool, destroy_caused: bool) {
    let data = self.assocs.get(&entity).expect("caller already validated liveness");
    let active = data.active;
    let events = self.contexts.route_presence_event(entity, trigger, data, added, active);
    for (cid, comp, kind) in events {
      trace!(?cid, component = comp.0, ?kind, ?entity, "routing presence event");
      self.enqueue_watcher_notification(cid, comp, kind, entity, destroy_caused);
    }
  }

  fn route_modify(&mut self, entity: Entity, trigger: ComponentId) {
    let events = self.contexts.route_modify_event(entity, trigger);
    for (cid, comp, kind) in events {
      self.enqueue_watcher_notification(cid, comp, kind, entity, false);
    }
  }

  fn route_activation(&mut self, entity: Entity, activated: bool) {
    let data = self.assocs.get(&entity).expect("caller already validated liveness");
    let events = self.contexts.route_activation_event(entity, data, activated);
    for (cid, kind) in events {
      // Activation events aren't keyed by a specific component; every
      // watcher on this context hears about it, mirroring the fact that
      // the active flag belongs to the whole entity, not one component.
      let components: Vec<ComponentId> = self.watchers.keys().filter(|(c, _)| *c == cid).map(|(_, comp)| *comp).collect();
      for comp in components {
        self.enqueue_watcher_notification(cid, comp, kind, entity, false);
      }
    }
  }

  fn enqueue_watcher_notification(
    &mut self,
    context: crate::context::ContextId,
    component: ComponentId,
    kind: NotificationKind,
    entity: Entity,
    destroy_caused: bool,
  ) {
    let key = self.watcher_id_for(context, component);
    let watcher = self.watchers.get(&key).expect("just ensured");
    if watcher.queue(kind, entity, destroy_caused) {
      self.pending_watchers.borrow_mut().insert(key);
    }
  }

  // ---- callbacks -----------------------------------------------------------

  fn run_create_callback(&self, entity: Entity, real_tid: TypeIdWrapper) {
    let Some(vtable) = self.component_vtables.get(&real_tid) else { return };
    let Some(cb) = vtable.callbacks.as_ref().and_then(Callbacks::get_create) else { return };
    let data = self.assocs.get(&entity).expect("caller already validated liveness");
    let id = self.registry.try_id_of_dyn(real_tid).expect("registered component has an id");
    let entry = data.components.get(&id).expect("just inserted");
    let lock = entry.try_read().unwrap_or_else(|_| loop_panic(entity, real_tid));
    let access = CallbackWorldAccess::new(self);
    cb(&**lock, entity, &access);
  }

  fn run_remove_callback(&self, entity: Entity, real_tid: TypeIdWrapper, boxed: Box<dyn Component>) {
    let Some(vtable) = self.component_vtables.get(&real_tid) else { return };
    let Some(cb) = vtable.callbacks.as_ref().and_then(Callbacks::get_remove) else { return };
    let access = CallbackWorldAccess::new(self);
    cb(boxed, entity, &access);
  }

  // ---- dispatch -----------------------------------------------------------

  pub(crate) fn dispatch_inner<M: Message>(&self, target: Entity, msg: M) -> M {
    let access = ListenerAccess::new(self);
    let result = self.dispatch_boxed(&access, target, Box::new(msg));
    // SAFETY: the type id is round-tripped through the same `M`.
    *unsafe { result.downcast().unwrap_unchecked() }
  }

  fn dispatch_boxed(&self, access: &ListenerAccess, target: Entity, mut msg: Box<dyn Message>) -> Box<dyn Message> {
    let msg_tid = (*msg).type_id_wrapper();
    self.pending_message_resolutions.borrow_mut().push((msg_tid, target));

    if let Some(data) = self.assocs.get(&target) {
      if !data.destroyed {
        data.messages_this_frame.borrow_mut().insert(registry::message_id_of_dyn(msg_tid));
        for (comp_tid, entry) in data.components_by_real_type(&self.component_vtables) {
          let vtable = self.component_vtables.get(&comp_tid).expect("components_by_real_type only yields registered types");
          let Some(handler) = vtable.msg_table.get(&msg_tid) else { continue };

          let lock = entry.try_read().unwrap_or_else(|_| loop_panic(target, comp_tid));
          msg = match handler {
            MsgHandlerInner::Read(handler) => handler(&**lock, msg, target, access),
            MsgHandlerInner::Write(handler) => {
              drop(lock);
              let mut lock = entry.try_write().unwrap_or_else(|_| loop_panic(target, comp_tid));
              handler(&mut **lock, msg, target, access)
            }
          };
          if access.is_cancelled() {
            break;
          }
        }
      }
    }

    for (queued_msg, queued_target) in access.queued_message_rx().try_iter() {
      self.dispatch_boxed(access, queued_target, queued_msg);
    }

    msg
  }

  // ---- frame pipeline -------------------------------------------------------

  pub fn pause(&mut self) {
    self.paused = true;
  }

  pub fn resume(&mut self) {
    self.paused = false;
  }

  pub fn is_paused(&self) -> bool {
    self.paused
  }

  /// Run early-start systems. Called exactly once, before the first real
  /// frame (spec §4.5 pipeline step 1).
  pub fn early_start(&mut self) {
    self.run_phase(SystemKind::EarlyStart);
  }

  /// Run start systems. Called exactly once, after entities exist
  /// (spec §4.5 pipeline step 2).
  pub fn start(&mut self) {
    self.run_phase(SystemKind::Start);
  }

  /// Run one full frame: fixed-update (one or more times), update,
  /// late-update, render, state-machine ticks, reactive drain, frame
  /// message clear, deferred destruction (spec §4.5 pipeline steps 3-5).
  pub fn run_frame(&mut self, elapsed_ms: u32) {
    self.frame_counter += 1;
    self.fixed_update_accumulator_ms += elapsed_ms;
    while self.fixed_update_accumulator_ms >= self.fixed_dt_ms {
      self.fixed_update_accumulator_ms -= self.fixed_dt_ms;
      self.run_fixed_update(self.fixed_dt_ms);
    }

    self.run_phase(SystemKind::Update);
    self.run_phase(SystemKind::LateUpdate);
    self.run_render();
    self.reactive_drain();
    self.clear_frame_messages();
    self.finalize();
  }

  fn run_fixed_update(&mut self, dt_ms: u32) {
    self.tick_state_machines(dt_ms);
    self.resolve_pending_state_machine_messages();

    let mut systems = std::mem::take(&mut self.systems);
    for descriptor in systems.iter_mut() {
      if descriptor.kind != SystemKind::FixedUpdate {
        continue;
      }
      let paused_block = self.paused && descriptor.skip_while_paused();
      let paused_only_block = !self.paused && descriptor.runs_while_paused_only();
      if paused_block || paused_only_block {
        continue;
      }
      self.run_timed(descriptor, |world, sys| sys.fixed_update(world, dt_ms));
    }
    self.systems = systems;
  }

  fn run_phase(&mut self, kind: SystemKind) {
    let mut systems = std::mem::take(&mut self.systems);
    for descriptor in systems.iter_mut() {
      if descriptor.kind != kind {
        continue;
      }
      let paused_block = self.paused && descriptor.skip_while_paused();
      let paused_only_block = !self.paused && descriptor.runs_while_paused_only();
      if paused_block || paused_only_block {
        continue;
      }
      match kind {
        SystemKind::EarlyStart => self.run_timed(descriptor, |w, s| s.early_start(w)),
        SystemKind::Start => self.run_timed(descriptor, |w, s| s.start(w)),
        SystemKind::Update => self.run_timed(descriptor, |w, s| s.update(w)),
        SystemKind::LateUpdate => self.run_timed(descriptor, |w, s| s.late_update(w)),
        _ => {}
      }
    }
    self.systems = systems;
  }

  fn run_render(&mut self) {
    let mut systems = std::mem::take(&mut self.systems);
    for descriptor in systems.iter_mut() {
      if descriptor.kind != SystemKind::Render {
        continue;
      }
      let start = std::time::Instant::now();
      descriptor.system.render(self);
      let elapsed = start.elapsed().as_secs_f64() * 1000.0;
      (self.timing_sink)(descriptor.name, elapsed, self.len());
    }
    self.systems = systems;
  }

  fn run_timed(&mut self, descriptor: &mut SystemDescriptor, mut f: impl FnMut(&mut World, &mut dyn crate::system::System)) {
    let start = std::time::Instant::now();
    f(self, &mut *descriptor.system);
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    (self.timing_sink)(descriptor.name, elapsed, self.len());
  }

  fn tick_state_machines(&mut self, dt_ms: u32) {
    let entities: Vec<Entity> = self.iter().collect();
    for entity in entities {
      self.tick_one_state_machine(entity, dt_ms);
    }
  }

  fn tick_one_state_machine(&mut self, entity: Entity, dt_ms: u32) {
    let Some(data) = self.assocs.get(&entity) else { return };
    let Some(entry) = data.components.get(&ComponentId::STATE_MACHINE) else { return };
    let real_tid = {
      let Ok(lock) = entry.try_read() else { return };
      lock.type_id_wrapper()
    };
    let Some(accessor) = self.state_machine_accessors.accessor_for(real_tid) else { return };

    // Reborrow mutably to actually tick; `tick` needs `&mut World` to pass
    // to the routine, so the component lock can't still be held while we
    // call back into `self`. Take the lock, detach, tick, reattach.
    let data = self.assocs.get_mut(&entity).expect("checked above");
    let entry = data.components.get_mut(&ComponentId::STATE_MACHINE).expect("checked above");
    let mut boxed = std::mem::replace(entry, RwLock::new(Box::new(NullComponent) as _)).into_inner().expect("exclusive");
    let sm = accessor(&mut *boxed);
    sm.tick(self, entity, dt_ms);

    if let Some(data) = self.assocs.get_mut(&entity) {
      if let Some(entry) = data.components.get_mut(&ComponentId::STATE_MACHINE) {
        *entry = RwLock::new(boxed);
      }
    }
  }

  fn resolve_pending_state_machine_messages(&mut self) {
    let pending = self.pending_message_resolutions.borrow_mut().split_off(0);
    if pending.is_empty() {
      return;
    }
    let entities: Vec<Entity> = self.iter().collect();
    for entity in entities {
      for &(msg_tid, target) in &pending {
        self.resolve_one_state_machine_message(entity, msg_tid, target);
      }
    }
    self.deliver_reactive_messages(&pending);
  }

  /// Hand each pending message send to every `Reactive` system that
  /// declared interest in that message type via [`SystemDescriptor::reacts_to_message`],
  /// grouping targets by message id the same way a watcher batches
  /// entities by notification kind (spec §6's message descriptors).
  fn deliver_reactive_messages(&mut self, pending: &[(TypeIdWrapper, Entity)]) {
    let mut by_id: AHashMap<ComponentId, Vec<Entity>> = AHashMap::default();
    for &(msg_tid, target) in pending {
      by_id.entry(registry::message_id_of_dyn(msg_tid)).or_default().push(target);
    }
    if by_id.is_empty() {
      return;
    }

    let mut systems = std::mem::take(&mut self.systems);
    for descriptor in systems.iter_mut() {
      if !matches!(descriptor.kind, SystemKind::Reactive { .. }) {
        continue;
      }
      for (&msg_id, targets) in &by_id {
        if !descriptor.consumes_message(msg_id) {
          continue;
        }
        let batch = NotificationBatch::single(NotificationKind::Modified, targets.clone());
        descriptor.system.react(self, msg_id, &batch);
      }
    }
    self.systems = systems;
  }

  fn resolve_one_state_machine_message(&mut self, entity: Entity, msg_tid: TypeIdWrapper, target: Entity) {
    let Some(data) = self.assocs.get(&entity) else { return };
    let Some(entry) = data.components.get(&ComponentId::STATE_MACHINE) else { return };
    let real_tid = {
      let Ok(lock) = entry.try_read() else { return };
      lock.type_id_wrapper()
    };
    let Some(accessor) = self.state_machine_accessors.accessor_for(real_tid) else { return };

    let data = self.assocs.get_mut(&entity).expect("checked above");
    let entry = data.components.get_mut(&ComponentId::STATE_MACHINE).expect("checked above");
    let mut boxed = std::mem::replace(entry, RwLock::new(Box::new(NullComponent) as _)).into_inner().expect("exclusive");
    let sm = accessor(&mut *boxed);
    sm.resolve_message(self, entity, msg_tid, target);

    if let Some(data) = self.assocs.get_mut(&entity) {
      if let Some(entry) = data.components.get_mut(&ComponentId::STATE_MACHINE) {
        *entry = RwLock::new(boxed);
      }
    }
  }

  fn reactive_drain(&mut self) {
    let pending: Vec<WatcherId> = self.pending_watchers.borrow_mut().drain(..).collect();
    for key @ (context, component) in pending {
      let watcher = self.watchers.get(&key).expect("drained id was registered");
      let batch = watcher.drain(|e| self.is_destroyed(e));
      if batch.is_empty() {
        continue;
      }
      let mut systems = std::mem::take(&mut self.systems);
      for descriptor in systems.iter_mut() {
        if descriptor.kind == (SystemKind::Reactive { context }) {
          descriptor.system.react(self, component, &batch);
        }
      }
      self.systems = systems;
    }
  }

  fn is_destroyed(&self, entity: Entity) -> bool {
    self.assocs.get(&entity).map(|d| d.destroyed).unwrap_or(true)
  }

  fn clear_frame_messages(&mut self) {
    for data in self.assocs.values_mut() {
      data.messages_this_frame.get_mut().clear();
    }
  }

  /// Apply every deferred lazy update (spawns/destroys queued from inside
  /// message handlers) and reclaim any entity whose destruction was
  /// deferred because a watcher still had it pending (spec §5).
  pub fn finalize(&mut self) {
    let updates: Vec<LazyUpdate> = self.lazy_channel.try_iter().collect();
    for update in updates {
      update.apply(self);
    }

    let reclaimable = std::mem::take(&mut self.deferred_destructions);
    for entity in reclaimable {
      self.reclaim_entity(entity);
    }
  }

  pub(crate) fn lazy_sender(&self) -> channel::Sender<LazyUpdate> {
    self.lazy_sender.clone()
  }

  pub(crate) fn registry_try_id_of<C: Component>(&self) -> Option<ComponentId> {
    self.registry.try_id_of::<C>()
  }

  pub(crate) fn entity_data(&self, entity: Entity) -> Option<&EntityData> {
    self.assocs.get(&entity).filter(|d| !d.destroyed)
  }

  /// Every live (non-destroyed) entity in the world, in no particular order.
  pub fn entities(&self) -> EntityIter<'_> {
    AccessEntityStats::iter(self)
  }

  /// Dispatch `msg` to every live entity in turn, returning each entity
  /// paired with the (possibly handler-mutated) message it ended up with.
  /// A convenience over calling [`AccessDispatcher::dispatch`] in a loop
  /// yourself; entities spawned or destroyed by a handler mid-sweep don't
  /// retroactively join or leave this sweep.
  pub fn dispatch_to_all<M: Message + Clone>(&self, msg: M) -> Vec<(Entity, M)> {
    self.entities().map(|entity| (entity, self.dispatch_inner(entity, msg.clone()))).collect()
  }
}

/// A filter is unsatisfiable if `all_of` and `none_of` name a common
/// component id -- nothing can both have and lack the same component.
/// Legal per §7, just worth a warning: see [`crate::error::FilterError`].
fn clause_is_unsatisfiable(clauses: &[FilterClause]) -> bool {
  let all_of: AHashSet<ComponentId> = clauses
    .iter()
    .filter(|c| c.kind == ClauseKind::AllOf)
    .flat_map(|c| c.components.iter().copied())
    .collect();
  let none_of: AHashSet<ComponentId> = clauses
    .iter()
    .filter(|c| c.kind == ClauseKind::NoneOf)
    .flat_map(|c| c.components.iter().copied())
    .collect();
  all_of.intersection(&none_of).next().is_some()
}

/// Placeholder dropped into a component slot for the brief window a
/// state machine tick needs to detach its own carrier component to get
/// `&mut World` access without aliasing it.
struct NullComponent;
impl Component for NullComponent {}

impl AccessDispatcher for World {
  fn dispatch<M: Message>(&self, target: Entity, msg: M) -> M {
    self.dispatch_inner(target, msg)
  }

  fn received_message<M: Message>(&self, entity: Entity) -> bool {
    let id = registry::message_id_of_dyn(TypeIdWrapper::of::<M>());
    self.assocs.get(&entity).map(|d| d.messages_this_frame.borrow().contains(&id)).unwrap_or(false)
  }
}

impl AccessEntityStats for World {
  fn len(&self) -> usize {
    self.assocs.values().filter(|d| !d.destroyed).count()
  }

  fn liveness(&self, entity: Entity) -> EntityLiveness {
    match self.assocs.get(&entity) {
      Some(data) if !data.destroyed => EntityLiveness::Alive,
      Some(_) => EntityLiveness::Destroyed,
      None if self.allocator.read().expect("allocator lock poisoned").contains(entity.0) => EntityLiveness::PartiallySpawned,
      None => EntityLiveness::Destroyed,
    }
  }

  fn len_of(&self, entity: Entity) -> usize {
    self.entity_data(entity).map(EntityData::len).unwrap_or_else(|| InvariantViolation::EntityDestroyed(entity).panic())
  }

  fn iter(&self) -> EntityIter<'_> {
    EntityIter { iter: self.assocs.iter() }
  }
}

impl AccessQuery for World {
  fn query<'c, Q: Query<'c>>(&'c self, interrogatee: Entity) -> Option<Q::Response> {
    Q::query(interrogatee, self)
  }
}

impl AccessResources for World {
  fn read_resource<R: Resource>(&self) -> Result<ReadResource<'_, R>, ResourceLookupError> {
    self.resources.read()
  }

  fn write_resource<R: Resource>(&self) -> Result<WriteResource<'_, R>, ResourceLookupError> {
    self.resources.write()
  }

  fn contains_resource<R: Resource>(&self) -> bool {
    self.resources.contains::<R>()
  }
}

/// A structural mutation queued from inside a message handler, applied
/// once [`World::finalize`] runs (spec §5).
pub(crate) enum LazyUpdate {
  SpawnEntity(Entity, Vec<Box<dyn Component>>),
  Destroy(Entity),
}

impl LazyUpdate {
  fn apply(self, world: &mut World) {
    match self {
      LazyUpdate::SpawnEntity(entity, components) => {
        // The id was minted (allocator-only) back at `lazy_spawn` time;
        // this is the first point `assocs` gets an entry for it.
        world.assocs.entry(entity).or_insert_with(EntityData::empty);
        for component in components {
          let real_tid = component.type_id_wrapper();
          let Some(id) = world.registry.try_id_of_dyn(real_tid) else {
            crate::error::missing_registration(real_tid);
          };
          let data = world.assocs.get_mut(&entity).expect("just inserted above");
          data.components.insert(id, RwLock::new(component));
          world.on_component_added(entity, id, real_tid);
        }
      }
      LazyUpdate::Destroy(entity) => {
        if world.liveness(entity) == EntityLiveness::Alive {
          world.destroy(entity);
        }
      }
    }
  }
}

impl EntityData {
  /// Iterate `(real concrete type id, entry)` pairs for every component on
  /// this entity, in attachment order -- the order message dispatch visits
  /// them in. Filtered to components whose concrete type was actually
  /// registered, which every component reaching storage always is.
  fn components_by_real_type<'a>(&'a self, vtables: &BTreeMap<TypeIdWrapper, ComponentVtable>) -> Vec<(TypeIdWrapper, &'a ComponentEntry)> {
    self
      .components
      .values()
      .filter_map(|entry| {
        let tid = entry.try_read().ok()?.type_id_wrapper();
        vtables.contains_key(&tid).then_some((tid, entry))
      })
      .collect()
  }
}
