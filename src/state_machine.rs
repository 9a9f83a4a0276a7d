//! Coroutine-driven state machines (spec §4.6, §9's coroutine-control-flow
//! redesign flag).
//!
//! A routine is a *manually encoded resumable state object* rather than a
//! language-native generator or an interpreter trampoline, for
//! portability (§9). Each call to
//! [`Routine::resume`] runs the routine forward to its next yield point
//! and returns the [`WaitDirective`] it's now blocked on; there is no
//! `async`/`await` and no interpreter loop, just a type implementing
//! `resume` however it likes (usually as an explicit step enum).

use ahash::AHashMap;
use downcast::Any;

use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;
use crate::TypeIdWrapper;

/// The reason a routine yielded, and what it takes to resume it.
pub enum WaitDirective {
  /// Deactivate the state machine. The component remains, but
  /// [`StateMachine::tick`] becomes a no-op until something reactivates it.
  Stop,
  /// Resume after `n` frames have been ticked (`0` means next frame).
  Frames(u32),
  /// Resume once at least `n` milliseconds have accumulated; the
  /// remainder carries over into the next wait.
  Ms(u32),
  /// Resume the first frame `target` (defaulting to the owning entity)
  /// is sent a message of this type.
  Message(TypeIdWrapper, Option<Entity>),
  /// Push an inner routine; resume the outer routine only once the inner
  /// one yields [`WaitDirective::Stop`].
  Routine(Box<dyn Routine>),
}

impl WaitDirective {
  /// Convenience constructor for [`WaitDirective::Message`] that waits on
  /// the owning entity.
  pub fn message<M: crate::message::Message>() -> Self {
    WaitDirective::Message(TypeIdWrapper::of::<M>(), None)
  }

  /// Convenience constructor for [`WaitDirective::Message`] waiting on a
  /// specific entity.
  pub fn message_from<M: crate::message::Message>(target: Entity) -> Self {
    WaitDirective::Message(TypeIdWrapper::of::<M>(), Some(target))
  }
}

/// A resumable sequence of wait-directives.
///
/// Implementors typically hold an explicit "which step am I on" enum or
/// index and advance it in [`Self::resume`]; there's no requirement that
/// this be driven by language coroutines.
pub trait Routine: 'static {
  /// Advance to the next yield point and return what it's waiting on now.
  /// Called once immediately after the routine starts (or is pushed as
  /// an inner routine) to get its first wait, and again every time a
  /// previous wait resolves.
  fn resume(&mut self, world: &mut World, owner: Entity) -> WaitDirective;

  /// Externally-visible name, used to detect the change
  /// [`StateMachine::subscribe`]rs are told about. Defaults to the type
  /// name, which is enough for routines that don't have meaningfully
  /// distinct named states.
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }
}

type StateChangeSubscriber = Box<dyn FnMut(&'static str, &'static str)>;

/// Per-component state-machine runtime: the routine stack, the current
/// wait, and the counters needed to resolve it.
pub struct StateMachine {
  stack: Vec<Box<dyn Routine>>,
  current: WaitDirective,
  ms_counter: u32,
  stopped: bool,
  last_name: &'static str,
  subscribers: Vec<StateChangeSubscriber>,
}

impl StateMachine {
  pub fn new(routine: impl Routine) -> Self {
    Self {
      stack: vec![Box::new(routine)],
      current: WaitDirective::Frames(0),
      ms_counter: 0,
      stopped: false,
      last_name: "",
      subscribers: Vec::new(),
    }
  }

  /// Called once when the owning component is attached to a live entity.
  pub fn initialize(&mut self, world: &mut World, owner: Entity) {
    let routine = self.stack.last_mut().expect("a state machine always has at least its root routine");
    let next = routine.resume(world, owner);
    self.settle(next, world, owner);
  }

  pub fn on_destroyed(&mut self) {
    self.stack.clear();
    self.stopped = true;
  }

  pub fn subscribe(&mut self, callback: impl FnMut(&'static str, &'static str) + 'static) {
    self.subscribers.push(Box::new(callback));
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped
  }

  /// Resolve the current wait against `elapsed_ms`, resuming the routine
  /// (possibly repeatedly, through nested [`WaitDirective::Routine`]s)
  /// until it's blocked on something that hasn't happened yet.
  pub fn tick(&mut self, world: &mut World, owner: Entity, elapsed_ms: u32) {
    if self.stopped {
      return;
    }

    let should_resume = match &self.current {
      WaitDirective::Stop => {
        self.stopped = true;
        false
      }
      WaitDirective::Frames(0) => true,
      WaitDirective::Frames(remaining) => {
        let remaining = *remaining - 1;
        self.current = WaitDirective::Frames(remaining);
        false
      }
      WaitDirective::Ms(threshold) => {
        let threshold = *threshold;
        self.ms_counter += elapsed_ms;
        if self.ms_counter >= threshold {
          self.ms_counter -= threshold;
          true
        } else {
          false
        }
      }
      // Message waits are resolved by `World::dispatch` calling
      // `resolve_message`, not by ticking; a nested routine's cadence is
      // its own business until it reports `Stop`.
      WaitDirective::Message(..) | WaitDirective::Routine(_) => false,
    };

    if should_resume {
      self.resume_current(world, owner);
    }
  }

  /// Called by the world when a message matching this state machine's
  /// current [`WaitDirective::Message`] wait is dispatched to `target`.
  pub(crate) fn resolve_message(&mut self, world: &mut World, owner: Entity, tid: TypeIdWrapper, target: Entity) -> bool {
    if self.stopped {
      return false;
    }
    let matches = matches!(&self.current, WaitDirective::Message(want_tid, want_target)
      if *want_tid == tid && want_target.unwrap_or(owner) == target);
    if matches {
      self.resume_current(world, owner);
    }
    matches
  }

  fn resume_current(&mut self, world: &mut World, owner: Entity) {
    let routine = self.stack.last_mut().expect("a state machine always has at least its root routine");
    let next = routine.resume(world, owner);
    self.settle(next, world, owner);
  }

  /// Act on a routine's just-returned [`WaitDirective`], pushing nested
  /// routines and unwinding nested `Stop`s until something actually blocks
  /// on a wait (or the whole stack stops). Used both for a machine's first
  /// resume ([`Self::initialize`]) and every subsequent one.
  fn settle(&mut self, next: WaitDirective, world: &mut World, owner: Entity) {
    match next {
      WaitDirective::Routine(inner) => {
        self.stack.push(inner);
        self.resume_current(world, owner);
      }
      WaitDirective::Stop if self.stack.len() > 1 => {
        self.stack.pop();
        self.resume_current(world, owner);
      }
      WaitDirective::Stop => {
        self.stopped = true;
        self.current = WaitDirective::Stop;
        self.announce();
      }
      other => {
        self.current = other;
        self.announce();
      }
    }
  }

  fn announce(&mut self) {
    let name = self.stack.last().map(|r| r.name()).unwrap_or("<stopped>");
    if name != self.last_name {
      for sub in &mut self.subscribers {
        sub(self.last_name, name);
      }
      self.last_name = name;
    }
  }
}

/// Implemented by a component that wraps a [`StateMachine`], opting it
/// into the framework's state-machine carrier interface -- its registry
/// id collapses onto [`ComponentId::STATE_MACHINE`](crate::registry::ComponentId::STATE_MACHINE).
pub trait StateMachineCarrier: Component {
  fn state_machine(&mut self) -> &mut StateMachine;
}

pub(crate) type StateMachineAccessor = fn(&mut dyn Component) -> &mut StateMachine;

#[derive(Default)]
pub(crate) struct StateMachineAccessTable {
  accessors: AHashMap<TypeIdWrapper, StateMachineAccessor>,
}

impl StateMachineAccessTable {
  pub(crate) fn register<C: StateMachineCarrier>(&mut self) {
    self.accessors.insert(TypeIdWrapper::of::<C>(), |component| {
      // SAFETY: only ever invoked with the concrete type that registered this accessor.
      let concrete: &mut C = unsafe { component.downcast_mut().unwrap_unchecked() };
      concrete.state_machine()
    });
  }

  pub(crate) fn accessor_for(&self, tid: TypeIdWrapper) -> Option<StateMachineAccessor> {
    self.accessors.get(&tid).copied()
  }
}
