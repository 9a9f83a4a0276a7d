//! `EntityBuilder`: insertion order, re-inserting a type overwrites it
//! in place rather than duplicating (spec §4.2).

use ecflow::prelude::*;

struct Foo(u32);
impl Component for Foo {}

struct Bar(String);
impl Component for Bar {}

struct Baz(i32);
impl Component for Baz {}

#[test]
fn get_components_off_builder() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  world.register_component::<Bar>();
  world.register_component::<Baz>();

  let built = world
    .spawn()
    .with(Foo(42))
    .with(Bar("Hello, world!".to_string()))
    .with(Baz(-69))
    .with(Bar("Elbereth".to_string()))
    .build();

  assert_eq!(world.len_of(built), 3);
  let (foo, bar, baz) = world.query::<(&Foo, &Bar, &Baz)>(built).unwrap();
  assert_eq!(foo.0, 42);
  assert_eq!(bar.0.as_str(), "Elbereth");
  assert_eq!(baz.0, -69);
}

#[test]
fn builder_len_tracks_distinct_types_only() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();

  let mut builder = world.spawn();
  assert!(builder.is_empty());
  builder.insert(Foo(1));
  builder.insert(Foo(2));
  assert_eq!(builder.len(), 1);
}
