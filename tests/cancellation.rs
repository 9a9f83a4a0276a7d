//! Enqueue-time notification cancellation (spec §5, §8 scenario 2):
//! an add-then-remove in the same undrained window never reaches a
//! watcher at all, and an add-then-disable erases the pending `Added`.

use std::cell::RefCell;
use std::rc::Rc;

use ecflow::prelude::*;

struct Marker;
impl Component for Marker {}

struct Recorder(Rc<RefCell<Vec<(NotificationKind, usize)>>>);
impl System for Recorder {
  fn react(&mut self, _world: &mut World, _component: ComponentId, batch: &NotificationBatch) {
    for (kind, entities) in batch.iter() {
      self.0.borrow_mut().push((kind, entities.len()));
    }
  }
}

fn setup() -> (World, Rc<RefCell<Vec<(NotificationKind, usize)>>>) {
  // `Marker`'s id -- and so the context id derived from it -- is settled
  // process-wide the first time anyone asks, with or without a `World`.
  // That lets the `Reactive` system be wired up before `build()`.
  let marker_id = component_id_of::<Marker>();
  let clauses = [FilterClause::new(ClauseKind::AllOf, Access::Write, [marker_id])];
  let context = ContextId::of(&clauses);

  let log = Rc::new(RefCell::new(Vec::new()));
  let mut builder = WorldBuilder::new();
  builder = builder.with_system(SystemDescriptor::new("recorder", SystemKind::Reactive { context }, Recorder(Rc::clone(&log))));
  let mut world = builder.build().unwrap();

  world.register_component::<Marker>();
  world.register_context(&clauses);
  (world, log)
}

#[test]
fn add_then_remove_same_frame_produces_no_notification() {
  let (mut world, log) = setup();
  let e = world.spawn_empty();
  world.add_component(e, Marker);
  world.remove_component::<Marker>(e);

  world.run_frame(16);
  assert!(log.borrow().is_empty(), "expected no notifications, got {:?}", log.borrow());
}

#[test]
fn add_then_disable_same_frame_erases_pending_added() {
  let (mut world, log) = setup();
  let e = world.spawn_empty();
  world.add_component(e, Marker);
  world.deactivate(e);

  world.run_frame(16);
  assert!(log.borrow().is_empty(), "expected no notifications, got {:?}", log.borrow());
}

#[test]
fn add_then_destroy_same_frame_still_delivers_removed() {
  let (mut world, log) = setup();
  let e = world.spawn_empty();
  world.add_component(e, Marker);
  world.destroy(e);

  world.run_frame(16);
  assert_eq!(*log.borrow(), vec![(NotificationKind::Removed, 1)], "a destroy-caused removal must survive even with a pending Added, unlike a plain remove_component");
}

#[test]
fn add_alone_is_delivered() {
  let (mut world, log) = setup();
  let e = world.spawn_empty();
  world.add_component(e, Marker);

  world.run_frame(16);
  assert_eq!(*log.borrow(), vec![(NotificationKind::Added, 1)]);
  let _ = e;
}
