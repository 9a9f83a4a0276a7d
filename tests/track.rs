//! A context's matching-entity snapshot tracks adds, removes, and
//! activation state without the host wiring up its own bookkeeping
//! (spec §4.3).

use ecflow::prelude::*;

struct Widget;
impl Component for Widget {}

struct NotAWidget;
impl Component for NotAWidget {}

#[test]
fn snapshot_tracks_matching_entities_as_they_come_and_go() {
  let mut world = WorldBuilder::new().build().unwrap();
  let widget_id = world.register_component::<Widget>();
  world.register_component::<NotAWidget>();

  let clauses = [FilterClause::new(ClauseKind::AllOf, Access::Read, [widget_id])];
  let context = world.register_context(&clauses);

  for _ in 0..50 {
    world.spawn().with(Widget).build();
    world.spawn().with(Widget).with(NotAWidget).build();
    world.spawn().with(NotAWidget).build();
  }
  world.finalize();
  assert_eq!(world.len(), 150);
  assert_eq!(world.context_snapshot(context).len(), 100);

  for e in world.entities().collect::<Vec<_>>() {
    if world.query::<&NotAWidget>(e).is_some() {
      world.destroy(e);
    }
  }
  world.finalize();

  // Half of the matching set (the Widget+NotAWidget entities) just left.
  assert_eq!(world.context_snapshot(context).len(), 50);
}

#[test]
fn snapshot_drops_an_entity_once_its_matching_component_is_removed() {
  let mut world = WorldBuilder::new().build().unwrap();
  let widget_id = world.register_component::<Widget>();

  let clauses = [FilterClause::new(ClauseKind::AllOf, Access::Read, [widget_id])];
  let context = world.register_context(&clauses);

  let e = world.spawn().with(Widget).build();
  assert_eq!(world.context_snapshot(context).len(), 1);

  world.remove_component::<Widget>(e);
  assert_eq!(world.context_snapshot(context).len(), 0);
}
