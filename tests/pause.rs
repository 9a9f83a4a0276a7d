//! Per-system pause gating for fixed-update systems (spec §4.5, §4.6):
//! `IncludeOnPause` keeps running while paused, `OnPauseOnly` runs only
//! while paused, and the default behavior skips entirely while paused.

use std::cell::RefCell;
use std::rc::Rc;

use ecflow::prelude::*;

struct Counter(Rc<RefCell<u32>>);
impl System for Counter {
  fn fixed_update(&mut self, _world: &mut World, _dt_ms: u32) {
    *self.0.borrow_mut() += 1;
  }
}

#[test]
fn normal_fixed_update_system_does_not_run_while_paused() {
  let ticks = Rc::new(RefCell::new(0));
  let descriptor = SystemDescriptor::new("normal", SystemKind::FixedUpdate, Counter(Rc::clone(&ticks)));
  let mut world = WorldBuilder::new().with_system(descriptor).build().unwrap();

  world.pause();
  world.run_frame(16);
  assert_eq!(*ticks.borrow(), 0);
}

#[test]
fn include_on_pause_fixed_update_system_keeps_running_while_paused() {
  let ticks = Rc::new(RefCell::new(0));
  let descriptor = SystemDescriptor::new("always", SystemKind::FixedUpdate, Counter(Rc::clone(&ticks)))
    .pause_behavior(PauseBehavior::IncludeOnPause);
  let mut world = WorldBuilder::new().with_system(descriptor).build().unwrap();

  world.pause();
  world.run_frame(16);
  assert_eq!(*ticks.borrow(), 1);

  world.resume();
  world.run_frame(16);
  assert_eq!(*ticks.borrow(), 2, "IncludeOnPause also runs while not paused");
}

#[test]
fn on_pause_only_fixed_update_system_runs_only_while_paused() {
  let ticks = Rc::new(RefCell::new(0));
  let descriptor = SystemDescriptor::new("pause-only", SystemKind::FixedUpdate, Counter(Rc::clone(&ticks)))
    .pause_behavior(PauseBehavior::OnPauseOnly);
  let mut world = WorldBuilder::new().with_system(descriptor).build().unwrap();

  world.run_frame(16);
  assert_eq!(*ticks.borrow(), 0, "must not run while not paused");

  world.pause();
  world.run_frame(16);
  assert_eq!(*ticks.borrow(), 1);
}
