//! Entity and world builders (spec §4.2's `spawn`, §4.5's world setup).
//!
//! [`EntityBuilder`] unifies [`ImmediateEntityBuilder`] (built from
//! `&mut World`) and [`LazyEntityBuilder`] (built from a message handler's
//! `&World`-shaped access) behind one interface: collect components, then
//! hand them to the world either immediately or through the lazy-update
//! queue. [`WorldBuilder`] is the fluent entry point that assembles the
//! system list and validates its `requires` ordering before a `World`
//! exists at all.

use ahash::{AHashMap, AHashSet};

use crate::component::Component;
use crate::entity::Entity;
use crate::error::ConfigurationError;
use crate::message::ListenerAccess;
use crate::system::SystemDescriptor;
use crate::world::{LazyUpdate, TimingSink, World};
use crate::TypeIdWrapper;

/// Unified interface for [`ImmediateEntityBuilder`] and [`LazyEntityBuilder`].
///
/// Components reach the entity in the order they were inserted here --
/// the same order message dispatch later walks them in.
pub trait EntityBuilder: Sized {
  /// Insert (or replace, if this type was already inserted) `component`.
  fn insert<C: Component>(&mut self, component: C) -> &mut Self;

  /// Insert `component`, consuming and returning `self` for chaining.
  fn with<C: Component>(mut self, component: C) -> Self {
    self.insert(component);
    self
  }

  /// How many components will be attached to the entity.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Consume this and give the entity to the world. The returned
  /// [`Entity`] is already a valid handle either way; with
  /// [`LazyEntityBuilder`] its components just aren't attached until
  /// [`World::finalize`] runs.
  fn build(self) -> Entity;
}

#[derive(Default)]
struct ComponentTracker {
  components: Vec<Box<dyn Component>>,
  indices: AHashMap<TypeIdWrapper, usize>,
}

impl ComponentTracker {
  fn insert<C: Component>(&mut self, component: C) {
    let tid = TypeIdWrapper::of::<C>();
    let boxed = Box::new(component) as _;
    if let Some(&idx) = self.indices.get(&tid) {
      self.components[idx] = boxed;
    } else {
      self.indices.insert(tid, self.components.len());
      self.components.push(boxed);
    }
  }

  fn len(&self) -> usize {
    self.components.len()
  }
}

/// An [`EntityBuilder`] made with exclusive access to the world -- the
/// entity's components are attached as soon as [`EntityBuilder::build`]
/// is called.
#[must_use = "does nothing until `.build()` is called"]
pub struct ImmediateEntityBuilder<'w> {
  world: &'w mut World,
  entity: Entity,
  tracker: ComponentTracker,
}

impl<'w> ImmediateEntityBuilder<'w> {
  pub(crate) fn new(world: &'w mut World, entity: Entity) -> Self {
    Self { world, entity, tracker: ComponentTracker::default() }
  }
}

impl<'w> EntityBuilder for ImmediateEntityBuilder<'w> {
  fn insert<C: Component>(&mut self, component: C) -> &mut Self {
    self.tracker.insert(component);
    self
  }

  fn len(&self) -> usize {
    self.tracker.len()
  }

  fn build(self) -> Entity {
    self.world.replace_components(self.entity, self.tracker.components);
    self.entity
  }
}

/// An [`EntityBuilder`] made from inside a message handler, which only
/// has `&World` to work with. The entity's id already exists (minted by
/// [`World::reserve_entity`](crate::world::World::reserve_entity) at
/// construction time); its components are queued through the lazy-update
/// channel and attached once [`World::finalize`] runs.
#[must_use = "does nothing until `.build()` is called"]
pub struct LazyEntityBuilder<'a> {
  access: &'a ListenerAccess<'a>,
  entity: Entity,
  tracker: ComponentTracker,
}

impl<'a> LazyEntityBuilder<'a> {
  pub(crate) fn new(access: &'a ListenerAccess<'a>) -> Self {
    let entity = access.world.reserve_entity();
    Self { access, entity, tracker: ComponentTracker::default() }
  }
}

impl<'a> EntityBuilder for LazyEntityBuilder<'a> {
  fn insert<C: Component>(&mut self, component: C) -> &mut Self {
    self.tracker.insert(component);
    self
  }

  fn len(&self) -> usize {
    self.tracker.len()
  }

  fn build(self) -> Entity {
    self.access.queue_update(LazyUpdate::SpawnEntity(self.entity, self.tracker.components));
    self.entity
  }
}

/// Fluent entry point for assembling a [`World`]: register systems, tune
/// the fixed-timestep cadence and initial pause state, install a timing
/// sink, then [`Self::build`] validates the system list's `requires`
/// ordering before anything exists.
pub struct WorldBuilder {
  systems: Vec<SystemDescriptor>,
  fixed_dt_ms: u32,
  start_paused: bool,
  timing_sink: Option<TimingSink>,
}

impl WorldBuilder {
  pub fn new() -> Self {
    Self { systems: Vec::new(), fixed_dt_ms: 16, start_paused: false, timing_sink: None }
  }

  /// Register a system. Order matters: a system only sees the world as
  /// it stood after every earlier system in the list ran this phase.
  #[must_use]
  pub fn with_system(mut self, descriptor: SystemDescriptor) -> Self {
    self.systems.push(descriptor);
    self
  }

  /// Set the fixed-update timestep, in milliseconds (spec §4.5). Defaults to 16.
  #[must_use]
  pub fn with_fixed_dt_ms(mut self, ms: u32) -> Self {
    self.fixed_dt_ms = ms;
    self
  }

  /// Whether the world starts paused.
  #[must_use]
  pub fn start_paused(mut self, paused: bool) -> Self {
    self.start_paused = paused;
    self
  }

  /// Install a diagnostics sink invoked once per system per phase with
  /// `(system name, elapsed ms, entity count)`. No-op by default.
  #[must_use]
  pub fn with_timing_sink(mut self, sink: impl Fn(&str, f64, usize) + Send + Sync + 'static) -> Self {
    self.timing_sink = Some(Box::new(sink));
    self
  }

  /// Validate the system list's ordering and hand back a ready-to-run
  /// `World`. Fails if a system name is registered twice, a `requires`
  /// names a system that never appears earlier in the list, or the
  /// `requires` graph has a cycle.
  pub fn build(self) -> Result<World, ConfigurationError> {
    validate_system_order(&self.systems)?;
    let timing_sink = self.timing_sink.unwrap_or_else(|| Box::new(|_: &str, _: f64, _: usize| {}) as TimingSink);
    Ok(World::new(self.systems, self.fixed_dt_ms, self.start_paused, timing_sink))
  }
}

impl Default for WorldBuilder {
  fn default() -> Self {
    Self::new()
  }
}

fn validate_system_order(systems: &[SystemDescriptor]) -> Result<(), ConfigurationError> {
  let mut seen_names: AHashSet<&'static str> = AHashSet::default();
  for desc in systems {
    if !seen_names.insert(desc.name) {
      return Err(ConfigurationError::DuplicateSystem(desc.name));
    }
  }

  let index_of: AHashMap<&'static str, usize> = systems.iter().enumerate().map(|(i, d)| (d.name, i)).collect();
  detect_requires_cycle(systems, &index_of)?;

  let mut appeared: AHashSet<&'static str> = AHashSet::default();
  for desc in systems {
    for required in &desc.requires {
      if !appeared.contains(required) {
        return Err(ConfigurationError::UnsatisfiedRequires { system: desc.name, required });
      }
    }
    appeared.insert(desc.name);
  }
  Ok(())
}

/// DFS cycle detection over the `requires` graph, independent of list
/// position -- a cycle is a configuration error on its own even before
/// checking whether any single edge runs backward in the list.
fn detect_requires_cycle(systems: &[SystemDescriptor], index_of: &AHashMap<&'static str, usize>) -> Result<(), ConfigurationError> {
  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    Unvisited,
    InProgress,
    Done,
  }

  fn visit(i: usize, systems: &[SystemDescriptor], index_of: &AHashMap<&'static str, usize>, marks: &mut [Mark]) -> Result<(), ConfigurationError> {
    match marks[i] {
      Mark::Done => return Ok(()),
      Mark::InProgress => return Err(ConfigurationError::CyclicOrdering(systems[i].name)),
      Mark::Unvisited => {}
    }
    marks[i] = Mark::InProgress;
    for required in &systems[i].requires {
      if let Some(&j) = index_of.get(required) {
        visit(j, systems, index_of, marks)?;
      }
    }
    marks[i] = Mark::Done;
    Ok(())
  }

  let mut marks = vec![Mark::Unvisited; systems.len()];
  for i in 0..systems.len() {
    visit(i, systems, index_of, &mut marks)?;
  }
  Ok(())
}
