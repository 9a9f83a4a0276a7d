//! Entity liveness across spawn, lazy spawn, and destroy (spec §2, §4.2).

use ecflow::prelude::*;

struct Marker;
impl Component for Marker {}

#[test]
fn livenesses() {
  let mut world = WorldBuilder::new().build().unwrap();

  for _ in 0..100 {
    let e = world.spawn_empty();
    assert_eq!(world.liveness(e), EntityLiveness::Alive);

    world.destroy(e);
    assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
  }
}

struct LastSpawned(Option<Entity>);
impl Resource for LastSpawned {}

#[derive(Clone)]
struct SpawnOne;
impl Message for SpawnOne {}

struct Spawner;
impl Component for Spawner {
  fn register_handlers(builder: HandlerBuilder<Self>) -> HandlerBuilder<Self> {
    builder.handle_read(|_: &Self, msg: SpawnOne, _, access: &ListenerAccess| {
      let spawned = access.lazy_spawn().with(Marker).build();
      (*access.write_resource::<LastSpawned>().unwrap()).0 = Some(spawned);
      msg
    })
  }
}

#[test]
fn lazy_spawn_is_partially_spawned_until_finalize() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Marker>();
  world.register_component::<Spawner>();
  world.insert_resource(LastSpawned(None));

  let caller = world.spawn_1(Spawner);
  world.dispatch(caller, SpawnOne);

  let e = world.read_resource::<LastSpawned>().unwrap().0.unwrap();
  assert_eq!(world.liveness(e), EntityLiveness::PartiallySpawned);

  world.finalize();
  assert_eq!(world.liveness(e), EntityLiveness::Alive);
  assert!(world.query::<&Marker>(e).is_some());
}

#[test]
fn destroy_is_idempotent_across_finalize() {
  let mut world = WorldBuilder::new().build().unwrap();
  let e = world.spawn_empty();
  world.destroy(e);
  world.destroy(e);
  world.finalize();
  assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
}
