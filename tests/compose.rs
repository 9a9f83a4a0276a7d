//! A destroyed-and-reclaimed slot never aliases whatever entity ends up
//! reusing it (spec §2).

use ecflow::prelude::*;

struct IdHaver(u32);
impl Component for IdHaver {}

#[test]
fn stale_handles_never_alias_a_reclaimed_slot() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<IdHaver>();

  let mut stale = Vec::new();
  for id in 0..1000u32 {
    let e = world.spawn_1(IdHaver(id));
    if id % 2 == 0 {
      world.destroy(e);
      stale.push(e);
    }
  }
  world.finalize();

  // Reuse the freed slots with fresh entities carrying a different id range.
  let mut fresh = Vec::new();
  for id in 1000..1500u32 {
    fresh.push(world.spawn_1(IdHaver(id)));
  }

  for e in stale {
    assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
  }
  for e in fresh {
    assert!(world.query::<&IdHaver>(e).unwrap().0 >= 1000);
  }
}

#[test]
fn entities_survive_a_round_trip_through_a_query() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<IdHaver>();

  for id in 0..100 {
    world.spawn_1(IdHaver(id));
  }

  let mut seen: Vec<u32> = world.entities().map(|e| world.query::<&IdHaver>(e).unwrap().0).collect();
  seen.sort_unstable();
  assert_eq!(seen, (0..100).collect::<Vec<_>>());
}
