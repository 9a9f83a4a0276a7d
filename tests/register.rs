//! A component type must be registered with a world before it can be
//! attached to an entity in it (spec §4.1).

use ecflow::prelude::*;

struct FooBar;
impl Component for FooBar {}

#[test]
#[should_panic(expected = "before it was registered with the world")]
fn fail_to_register() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.spawn().with(FooBar).build();
}

#[test]
fn register_component_is_idempotent() {
  let mut world = WorldBuilder::new().build().unwrap();
  let first = world.register_component::<FooBar>();
  let second = world.register_component::<FooBar>();
  assert_eq!(first, second);
}
