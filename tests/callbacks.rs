//! Component create/remove callbacks, and `dispatch_to_all` (spec §4.1, §11).

use ecflow::prelude::*;

struct Rabbit;

impl Rabbit {
  /// Every rabbit duplicates itself.
  fn mitosis(&self, event: MsgReproduceMitosis, _: Entity, access: &ListenerAccess) -> MsgReproduceMitosis {
    access.lazy_spawn().with(Rabbit).build();
    event
  }

  fn reproduce_and_die(&self, event: MsgReproduceAndDie, this: Entity, access: &ListenerAccess) -> MsgReproduceAndDie {
    // Interleaving birth and death within the same deferred batch works.
    access.lazy_spawn().with(Rabbit).build();
    access.lazy_destroy(this);
    access.lazy_spawn().with(Rabbit).build();
    event
  }
}

impl Component for Rabbit {
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
    builder
      .handle_read(Rabbit::mitosis)
      .handle_read(Rabbit::reproduce_and_die)
      .on_create(|_, _, access| {
        (*access.write_resource::<PopulationTracker>().unwrap()).0 += 1;
      })
      .on_remove(|_, _, access| {
        (*access.write_resource::<PopulationTracker>().unwrap()).0 -= 1;
      })
  }
}

struct NotRabbit;
impl Component for NotRabbit {}

struct PopulationTracker(u64);
impl Resource for PopulationTracker {}

#[derive(Debug, Clone, Copy)]
struct MsgReproduceMitosis;
impl Message for MsgReproduceMitosis {}

#[derive(Debug, Clone, Copy)]
struct MsgReproduceAndDie;
impl Message for MsgReproduceAndDie {}

#[test]
fn population_doubles_by_mitosis() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Rabbit>();
  world.register_component::<NotRabbit>();
  world.insert_resource(PopulationTracker(0));

  world.spawn().with(Rabbit).build();
  assert_eq!(world.read_resource::<PopulationTracker>().unwrap().0, 1);

  for _ in 0..100 {
    world.spawn_1(NotRabbit);
  }

  for i in 0..8 {
    world.dispatch_to_all(MsgReproduceMitosis);
    world.finalize();
    assert_eq!(world.read_resource::<PopulationTracker>().unwrap().0, 2u64.pow(i + 1));
  }
}

#[test]
fn population_still_doubles_when_interleaved_with_death() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Rabbit>();
  world.register_component::<NotRabbit>();
  world.insert_resource(PopulationTracker(0));

  world.spawn().with(Rabbit).build();
  assert_eq!(world.read_resource::<PopulationTracker>().unwrap().0, 1);

  for _ in 0..100 {
    world.spawn_1(NotRabbit);
  }

  for i in 0..8 {
    world.dispatch_to_all(MsgReproduceAndDie);
    world.finalize();
    assert_eq!(world.read_resource::<PopulationTracker>().unwrap().0, 2u64.pow(i + 1));
  }
}
