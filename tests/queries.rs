//! Typed component queries: `&C`, `&mut C`, `Option<Q>`, and tuples (spec §11).

use ecflow::prelude::*;

struct Foo(i32);
impl Component for Foo {}

struct Bar(&'static str);
impl Component for Bar {}

#[test]
fn read_query() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  let e = world.spawn_1(Foo(5));
  assert_eq!(world.query::<&Foo>(e).map(|f| f.0), Some(5));
}

#[test]
fn write_query_mutates_in_place() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  let e = world.spawn_1(Foo(5));

  {
    let mut foo = world.query::<&mut Foo>(e).unwrap();
    foo.0 += 1;
  }

  assert_eq!(world.query::<&Foo>(e).map(|f| f.0), Some(6));
}

#[test]
fn query_for_absent_component_is_none() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  world.register_component::<Bar>();
  let e = world.spawn_1(Foo(1));
  assert!(world.query::<&Bar>(e).is_none());
}

#[test]
fn option_query_never_fails() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  world.register_component::<Bar>();
  let e = world.spawn_1(Foo(1));

  let result = world.query::<Option<&Bar>>(e);
  assert!(matches!(result, Some(None)));
}

#[test]
fn tuple_query_ands_its_members() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  world.register_component::<Bar>();

  let both = world.spawn().with(Foo(1)).with(Bar("hi")).build();
  let only_foo = world.spawn_1(Foo(2));

  let (foo, bar) = world.query::<(&Foo, &Bar)>(both).unwrap();
  assert_eq!(foo.0, 1);
  assert_eq!(bar.0, "hi");

  assert!(world.query::<(&Foo, &Bar)>(only_foo).is_none());
}

#[test]
#[should_panic]
fn query_on_dead_entity_panics() {
  let mut world = WorldBuilder::new().build().unwrap();
  world.register_component::<Foo>();
  let e = world.spawn_1(Foo(1));
  world.destroy(e);
  world.len_of(e);
}
