//! Coroutine-driven state machines: first-resume nested-routine handling
//! and frame-driven pause gating (spec §4.5, §4.6).

use ecflow::prelude::*;

struct StopImmediately;
impl Routine for StopImmediately {
  fn resume(&mut self, _world: &mut World, _owner: Entity) -> WaitDirective {
    WaitDirective::Stop
  }
}

struct PushesNestedOnFirstResume {
  resumed: u8,
}
impl Routine for PushesNestedOnFirstResume {
  fn resume(&mut self, _world: &mut World, _owner: Entity) -> WaitDirective {
    self.resumed += 1;
    match self.resumed {
      1 => WaitDirective::Routine(Box::new(StopImmediately)),
      _ => WaitDirective::Stop,
    }
  }
}

struct Carrier(StateMachine);
impl Component for Carrier {}
impl StateMachineCarrier for Carrier {
  fn state_machine(&mut self) -> &mut StateMachine {
    &mut self.0
  }
}

#[test]
fn initialize_unwinds_a_nested_routine_yielded_on_the_first_resume() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_state_machine_component::<Carrier>();

  let carrier = Carrier(StateMachine::new(PushesNestedOnFirstResume { resumed: 0 }));
  let e = world.spawn_1(carrier);

  // The root routine's first yield was itself `Routine(inner)`; the
  // inner routine stopped immediately, so the outer routine should have
  // been resumed a second time and stopped too, instead of the machine
  // getting stuck on a bare `Routine(_)` that `tick` never advances.
  let stopped = world.query::<&mut Carrier>(e).map(|mut c| c.0.is_stopped());
  assert_eq!(stopped, Some(true));
}
