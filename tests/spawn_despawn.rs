//! Spawning, destroying, and the entity handle's liveness story.

use ecflow::prelude::*;

struct Marker(u32);
impl Component for Marker {}

#[test]
fn spawn_empty_then_add() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Marker>();

  let e = world.spawn_empty();
  assert_eq!(world.liveness(e), EntityLiveness::Alive);
  assert_eq!(world.len_of(e), 0);

  world.add_component(e, Marker(7));
  assert_eq!(world.len_of(e), 1);
  assert_eq!(world.query::<&Marker>(e).map(|m| m.0), Some(7));
}

#[test]
fn spawn_1_and_builder_agree() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Marker>();

  let a = world.spawn_1(Marker(1));
  let b = world.spawn().with(Marker(2)).build();

  assert_eq!(world.query::<&Marker>(a).map(|m| m.0), Some(1));
  assert_eq!(world.query::<&Marker>(b).map(|m| m.0), Some(2));
  assert_eq!(world.len(), 2);
}

#[test]
fn destroy_marks_entity_destroyed_and_drops_len() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Marker>();

  let e = world.spawn_1(Marker(3));
  assert_eq!(world.len(), 1);

  world.destroy(e);
  assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
  assert_eq!(world.len(), 0);
  assert!(world.query::<&Marker>(e).is_none());
}

#[test]
fn destroy_is_idempotent() {
  let mut world = WorldBuilder::new().build().unwrap();
  let e = world.spawn_empty();
  world.destroy(e);
  world.destroy(e);
  assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
}

#[test]
fn finalize_reclaims_destroyed_slots() {
  let mut world = WorldBuilder::new().build().unwrap();
  let e = world.spawn_empty();
  world.destroy(e);
  world.finalize();
  // Reclaimed entirely -- a stale handle reads back the same as one that
  // was never allocated, not as partially spawned.
  assert_eq!(world.liveness(e), EntityLiveness::Destroyed);
}

#[test]
fn entities_iterates_only_live_entities() {
  let mut world = WorldBuilder::new().build().unwrap();
  let a = world.spawn_empty();
  let b = world.spawn_empty();
  world.destroy(a);

  let live: Vec<Entity> = world.entities().collect();
  assert_eq!(live, vec![b]);
}
