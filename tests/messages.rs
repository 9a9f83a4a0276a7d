//! Message dispatch: per-component handlers, attachment order, and
//! queued cross-entity dispatch (spec §3, §4.2).

use std::cell::RefCell;
use std::rc::Rc;

use ecflow::prelude::*;

#[derive(Clone)]
struct Ping(i32);
impl Message for Ping {}

struct Doubler;
impl Component for Doubler {
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
    builder.handle_read(|_: &Self, msg: Ping, _, _| Ping(msg.0 * 2))
  }
}

struct Adder(i32);
impl Component for Adder {
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
    builder.handle_write(|this: &mut Self, msg: Ping, _, _| {
      this.0 += msg.0;
      msg
    })
  }
}

struct Relayer(Entity);
impl Component for Relayer {
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
    builder.handle_read(|this: &Self, msg: Ping, _, access: &ListenerAccess| {
      access.queue_dispatch(this.0, Ping(msg.0));
      msg
    })
  }
}

#[test]
fn handlers_run_in_attachment_order() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Doubler>();
  world.register_component::<Adder>();

  let e = world.spawn().with(Doubler).with(Adder(0)).build();
  let result = world.dispatch(e, Ping(5));
  assert_eq!(result.0, 10);
  assert_eq!(world.query::<&Adder>(e).map(|a| a.0), Some(10));
}

#[test]
fn write_handler_mutates_its_own_component() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Adder>();

  let e = world.spawn_1(Adder(3));
  world.dispatch(e, Ping(4));
  world.dispatch(e, Ping(4));
  assert_eq!(world.query::<&Adder>(e).map(|a| a.0), Some(11));
}

#[test]
fn queued_dispatch_reaches_the_target_after_the_current_chain_finishes() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Relayer>();
  world.register_component::<Adder>();

  let target = world.spawn_1(Adder(0));
  let relayer = world.spawn_1(Relayer(target));

  world.dispatch(relayer, Ping(7));
  assert_eq!(world.query::<&Adder>(target).map(|a| a.0), Some(7));
}

#[test]
fn cancelling_a_dispatch_stops_later_components() {
  struct Canceller;
  impl Component for Canceller {
    fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
      builder.handle_read(|_: &Self, msg: Ping, _, access: &ListenerAccess| {
        access.cancel();
        msg
      })
    }
  }

  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Canceller>();
  world.register_component::<Adder>();

  let e = world.spawn().with(Canceller).with(Adder(0)).build();
  world.dispatch(e, Ping(9));
  assert_eq!(world.query::<&Adder>(e).map(|a| a.0), Some(0));
}

#[test]
fn dispatch_records_the_message_in_the_frame_bucket() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Adder>();
  let e = world.spawn_1(Adder(0));

  assert!(!world.received_message::<Ping>(e));
  world.dispatch(e, Ping(1));
  assert!(world.received_message::<Ping>(e));

  world.run_frame(16);
  assert!(!world.received_message::<Ping>(e), "frame bucket must clear at frame end");
}

struct PingWatcher(Rc<RefCell<Vec<usize>>>);
impl System for PingWatcher {
  fn react(&mut self, _world: &mut World, _message: ComponentId, batch: &NotificationBatch) {
    for (_, entities) in batch.iter() {
      self.0.borrow_mut().push(entities.len());
    }
  }
}

#[test]
fn reactive_system_consuming_a_message_type_is_notified() {
  // A message-only `Reactive` system has no entities to match, so it
  // registers against a never-matching context (spec §4.3's `none` clause).
  let clauses = [FilterClause::new(ClauseKind::None, Access::Write, [])];
  let context = ContextId::of(&clauses);

  let log = Rc::new(RefCell::new(Vec::new()));
  let descriptor = SystemDescriptor::new("ping-watcher", SystemKind::Reactive { context }, PingWatcher(Rc::clone(&log))).reacts_to_message::<Ping>();
  let mut world = WorldBuilder::new().with_system(descriptor).build().unwrap();
  world.register_component::<Adder>();

  let e = world.spawn_1(Adder(0));
  world.dispatch(e, Ping(1));
  assert!(log.borrow().is_empty(), "delivery happens on the next fixed-update tick, not synchronously");

  world.run_frame(16);
  assert_eq!(*log.borrow(), vec![1]);
}
