//! `add_component` / `remove_component` / `replace_components` (spec §4.2).

use ecflow::prelude::*;

struct Health(i32);
impl Component for Health {}

struct Shield(i32);
impl Component for Shield {
  fn keep_on_replace() -> bool {
    true
  }
}

#[test]
fn add_then_remove_round_trips() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Health>();

  let e = world.spawn_empty();
  world.add_component(e, Health(10));
  assert!(world.remove_component::<Health>(e));
  assert_eq!(world.len_of(e), 0);
  assert!(world.query::<&Health>(e).is_none());
}

#[test]
fn remove_of_absent_component_is_a_no_op() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Health>();
  let e = world.spawn_empty();
  assert!(!world.remove_component::<Health>(e));
}

#[test]
#[should_panic]
fn adding_duplicate_component_panics() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Health>();
  let e = world.spawn_1(Health(1));
  world.add_component(e, Health(2));
}

#[test]
fn replace_components_overwrites_matching_and_keeps_extra() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Health>();
  world.register_component::<Shield>();

  let e = world.spawn().with(Health(10)).with(Shield(3)).build();
  world.replace_components(e, vec![Box::new(Health(99))]);

  assert_eq!(world.query::<&Health>(e).map(|h| h.0), Some(99));
  // Shield::keep_on_replace is true, and wasn't even named in the
  // replacement set, so it stays untouched either way.
  assert_eq!(world.query::<&Shield>(e).map(|s| s.0), Some(3));
}

#[test]
fn keep_on_replace_wins_over_an_incoming_replacement() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Shield>();

  let e = world.spawn().with(Shield(3)).build();
  world.replace_components(e, vec![Box::new(Shield(999))]);

  assert_eq!(world.query::<&Shield>(e).map(|s| s.0), Some(3));
}
