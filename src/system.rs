//! The frame pipeline's system list (spec §4.5, §9's tagged-enumeration
//! redesign flag).
//!
//! Rather than dispatch on a trait object's dynamic type to decide which
//! phases a system participates in, each [`SystemDescriptor`] carries an
//! explicit [`SystemKind`] tag plus whatever subset of [`System`]'s
//! methods it overrides; the pipeline just walks the list once per phase,
//! filtering on the tag. That's the "tagged enumeration plus a vtable of
//! the handlers it implements" spec §9 asks for in place of the source's
//! dynamic-dispatch-across-variants approach.

use crate::context::ContextId;
use crate::message::Message;
use crate::registry::{self, ComponentId};
use crate::watcher::NotificationBatch;
use crate::world::World;

/// Which phase(s) of the frame pipeline a system participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
  EarlyStart,
  Start,
  Update,
  FixedUpdate,
  LateUpdate,
  /// Runs every frame regardless of pause state.
  Render,
  /// Consumes a watcher's notification batch instead of polling.
  Reactive { context: ContextId },
}

/// Whether a system runs while the world is paused (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseBehavior {
  /// Skipped while paused. The default for update / fixed-update / late-update systems.
  Normal,
  /// Runs whether or not the world is paused.
  IncludeOnPause,
  /// Only runs while the world is paused.
  OnPauseOnly,
}

impl Default for PauseBehavior {
  fn default() -> Self {
    PauseBehavior::Normal
  }
}

/// Behavior registered with a [`World`](crate::world::World) through
/// [`WorldBuilder::with_system`](crate::builder::WorldBuilder::with_system).
///
/// Only the phase methods matching the descriptor's [`SystemKind`] are
/// ever actually called; the rest can be left at their no-op defaults.
pub trait System: 'static {
  fn early_start(&mut self, _world: &mut World) {}
  fn start(&mut self, _world: &mut World) {}
  fn update(&mut self, _world: &mut World) {}
  fn fixed_update(&mut self, _world: &mut World, _dt_ms: u32) {}
  fn late_update(&mut self, _world: &mut World) {}
  fn render(&mut self, _world: &World) {}
  /// Called once per watcher drain for a component this system watches,
  /// and once per fixed-update tick for each message type it declared
  /// through [`SystemDescriptor::reacts_to_message`] -- `component` is
  /// the message's id and `batch` lists the entities it was sent to in
  /// that case, tagged [`NotificationKind::Modified`](crate::watcher::NotificationKind::Modified)
  /// since no watcher ever produced it.
  fn react(&mut self, _world: &mut World, _component: ComponentId, _batch: &NotificationBatch) {}
}

/// A registered system plus the scheduling metadata the pipeline and the
/// requires-ordering check need.
pub struct SystemDescriptor {
  pub(crate) name: &'static str,
  pub(crate) kind: SystemKind,
  pub(crate) pause_behavior: PauseBehavior,
  pub(crate) requires: Vec<&'static str>,
  pub(crate) message_interest: Vec<ComponentId>,
  pub(crate) system: Box<dyn System>,
}

impl SystemDescriptor {
  pub fn new(name: &'static str, kind: SystemKind, system: impl System) -> Self {
    Self {
      name,
      kind,
      pause_behavior: PauseBehavior::default(),
      requires: Vec::new(),
      message_interest: Vec::new(),
      system: Box::new(system),
    }
  }

  #[must_use]
  pub fn pause_behavior(mut self, behavior: PauseBehavior) -> Self {
    self.pause_behavior = behavior;
    self
  }

  /// Declare that `other` must appear strictly earlier in the system list
  /// than this one, or world construction fails with a configuration
  /// error (spec §4.5).
  #[must_use]
  pub fn requires(mut self, other: &'static str) -> Self {
    self.requires.push(other);
    self
  }

  /// Declare that this (necessarily [`SystemKind::Reactive`]) system
  /// consumes messages of type `M`: whenever one is sent,
  /// [`System::react`] is called with `M`'s [`ComponentId`] and a batch
  /// listing every entity it was sent to this tick (spec §6's message
  /// descriptors).
  #[must_use]
  pub fn reacts_to_message<M: Message>(mut self) -> Self {
    self.message_interest.push(registry::message_id_of::<M>());
    self
  }

  pub(crate) fn consumes_message(&self, id: ComponentId) -> bool {
    self.message_interest.contains(&id)
  }

  pub(crate) fn skip_while_paused(&self) -> bool {
    !matches!(self.kind, SystemKind::Render | SystemKind::Reactive { .. } | SystemKind::Start | SystemKind::EarlyStart)
      && self.pause_behavior == PauseBehavior::Normal
  }

  pub(crate) fn runs_while_paused_only(&self) -> bool {
    self.pause_behavior == PauseBehavior::OnPauseOnly
  }
}
