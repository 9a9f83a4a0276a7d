//! Maintains the matching-entity set for one filter signature and routes
//! component-level events to the watchers that care (spec §4.3).
//!
//! Two systems that register the same filter signature share one
//! [`Context`] -- identity is computed from the canonicalized clause list,
//! so registration order and duplicate registration never create two
//! copies of the same matching set. Instead of the source's bidirectional
//! entity <-> context <-> watcher reference graph (flagged in spec §9 as
//! leak-prone), this context never holds a literal subscriber list on the
//! entity side at all: [`ContextTable`] keeps one reverse index from
//! component-id to interested context-ids, built once when a context is
//! registered, and every mutation routes through it. An entity that stops
//! matching just stops appearing in these lookups; there's nothing to
//! detach.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::IndexSet;

use crate::entity::{Entity, EntityData};
use crate::registry::ComponentId;
use crate::watcher::NotificationKind;

/// Whether a filter clause wants shared or exclusive access to the
/// components it names.
///
/// Tracked for the host's benefit (e.g. a future parallel scheduler); it
/// plays no part in matching. For context identity, read and write
/// collapse to write (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Read,
  Write,
}

/// The role one clause plays in a filter signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
  AllOf,
  AnyOf,
  NoneOf,
  /// Marks a context that never matches any entity -- used by a system
  /// that exists only for ordering or to claim a dedicated context slot.
  None,
}

/// One clause of a filter signature: a kind, the components it names
/// (already expanded through the registry -- a carrier interface
/// collapses to its one reserved id), and the access it wants.
#[derive(Debug, Clone)]
pub struct FilterClause {
  pub kind: ClauseKind,
  pub access: Access,
  pub components: Vec<ComponentId>,
}

impl FilterClause {
  pub fn new(kind: ClauseKind, access: Access, components: impl IntoIterator<Item = ComponentId>) -> Self {
    Self {
      kind,
      access,
      components: components.into_iter().collect(),
    }
  }
}

/// Canonical id for a filter signature. Two signatures with the same
/// clause kinds, the same sorted component-id sets, and access flags
/// collapsed read|write -> write hash to the same id (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
  /// Compute the id a set of clauses would register under, without a
  /// live [`World`](crate::world::World) to register them against. Pure
  /// function of the clause data -- lets a [`SystemKind::Reactive`]
  /// system be wired up in a [`WorldBuilder`](crate::builder::WorldBuilder)
  /// before the `World` it will run on exists, as long as the
  /// [`ComponentId`]s in the clauses were themselves obtained via
  /// [`crate::registry::component_id_of`] rather than a particular
  /// `World`'s registry (spec §4.1, §4.3).
  ///
  /// [`SystemKind::Reactive`]: crate::system::SystemKind::Reactive
  pub fn of(clauses: &[FilterClause]) -> Self {
    let mut hasher = DefaultHasher::new();
    for clause in clauses {
      (clause.kind as u8 as u32).hash(&mut hasher);
      let mut ids: Vec<u32> = clause.components.iter().map(|c| c.0).collect();
      ids.sort_unstable();
      ids.hash(&mut hasher);
    }
    ContextId(hasher.finish())
  }
}

/// One filter signature's matching set and fan-out bookkeeping.
pub struct Context {
  id: ContextId,
  never: bool,
  all_of: Vec<ComponentId>,
  any_of: Vec<ComponentId>,
  none_of: Vec<ComponentId>,
  active: IndexSet<Entity, ahash::RandomState>,
  deactivated: IndexSet<Entity, ahash::RandomState>,
  snapshot: RefCell<Option<Rc<[Entity]>>>,
}

impl Context {
  fn new(id: ContextId, clauses: &[FilterClause]) -> Self {
    let mut never = false;
    let mut all_of = Vec::new();
    let mut any_of = Vec::new();
    let mut none_of = Vec::new();
    for clause in clauses {
      match clause.kind {
        ClauseKind::AllOf => all_of.extend(clause.components.iter().copied()),
        ClauseKind::AnyOf => any_of.extend(clause.components.iter().copied()),
        ClauseKind::NoneOf => none_of.extend(clause.components.iter().copied()),
        ClauseKind::None => never = true,
      }
    }
    Self {
      id,
      never,
      all_of,
      any_of,
      none_of,
      active: IndexSet::default(),
      deactivated: IndexSet::default(),
      snapshot: RefCell::new(None),
    }
  }

  pub fn id(&self) -> ContextId {
    self.id
  }

  fn does_match(&self, data: &EntityData) -> bool {
    if self.never {
      return false;
    }
    if self.none_of.iter().any(|id| data.has(*id)) {
      return false;
    }
    if !self.all_of.iter().all(|id| data.has(*id)) {
      return false;
    }
    if !self.any_of.is_empty() && !self.any_of.iter().any(|id| data.has(*id)) {
      return false;
    }
    true
  }

  /// Every component id this context cares about that `data` currently
  /// carries -- used to replay `added` for a freshly-matching entity.
  fn present_relevant_ids(&self, data: &EntityData) -> Vec<ComponentId> {
    self.all_of.iter().chain(self.any_of.iter()).copied().filter(|id| data.has(*id)).collect()
  }

  pub fn is_matching(&self, entity: Entity) -> bool {
    self.active.contains(&entity) || self.deactivated.contains(&entity)
  }

  /// The currently-active matching set, as a cached, ref-counted
  /// snapshot. Rebuilt lazily the first time it's asked for after a
  /// mutation invalidates the cache.
  pub fn snapshot(&self) -> Rc<[Entity]> {
    let mut cache = self.snapshot.borrow_mut();
    if let Some(existing) = cache.as_ref() {
      return Rc::clone(existing);
    }
    let built: Rc<[Entity]> = self.active.iter().copied().collect();
    *cache = Some(Rc::clone(&built));
    built
  }

  fn invalidate(&self) {
    *self.snapshot.borrow_mut() = None;
  }
}

/// Owns every [`Context`] ever registered plus the component-id ->
/// context-id reverse index used to route mutation events without any
/// per-entity subscriber bookkeeping.
#[derive(Default)]
pub(crate) struct ContextTable {
  contexts: AHashMap<ContextId, Context>,
  interest: AHashMap<ComponentId, Vec<ContextId>>,
}

impl ContextTable {
  pub(crate) fn register(&mut self, clauses: &[FilterClause]) -> ContextId {
    let id = ContextId::of(clauses);
    if self.contexts.contains_key(&id) {
      return id;
    }
    let ctx = Context::new(id, clauses);
    for &component in ctx.all_of.iter().chain(ctx.any_of.iter()).chain(ctx.none_of.iter()) {
      let interested = self.interest.entry(component).or_default();
      if !interested.contains(&id) {
        interested.push(id);
      }
    }
    self.contexts.insert(id, ctx);
    id
  }

  pub(crate) fn get(&self, id: ContextId) -> &Context {
    self.contexts.get(&id).expect("context ids are never forged outside ContextTable::register")
  }

  /// Route an add/remove event for one component on `entity`. `present`
  /// must reflect whether the component is present on the entity *after*
  /// the mutation -- the caller performs the storage mutation first.
  pub(crate) fn route_presence_event(
    &mut self,
    entity: Entity,
    trigger: ComponentId,
    data: &EntityData,
    added: bool,
    active: bool,
  ) -> Vec<(ContextId, ComponentId, NotificationKind)> {
    let mut out = Vec::new();
    let Some(ids) = self.interest.get(&trigger) else {
      return out;
    };
    let ids = ids.clone();
    for cid in ids {
      let ctx = self.contexts.get_mut(&cid).expect("interest index only names registered contexts");
      let was_matching = ctx.is_matching(entity);
      let now_matching = ctx.does_match(data);

      match (was_matching, now_matching) {
        (false, true) => {
          if active {
            ctx.active.insert(entity);
          } else {
            ctx.deactivated.insert(entity);
          }
          ctx.invalidate();
          for id in ctx.present_relevant_ids(data) {
            out.push((cid, id, NotificationKind::Added));
          }
        }
        (true, false) => {
          ctx.active.shift_remove(&entity);
          ctx.deactivated.shift_remove(&entity);
          ctx.invalidate();
          out.push((cid, trigger, NotificationKind::Removed));
        }
        (true, true) => {
          if added {
            out.push((cid, trigger, NotificationKind::Added));
          } else {
            out.push((cid, trigger, NotificationKind::Removed));
          }
        }
        (false, false) => {}
      }
    }
    out
  }

  /// Route a modify event: components don't change membership here, so
  /// this only ever forwards to contexts that already match `entity`.
  pub(crate) fn route_modify_event(&self, entity: Entity, trigger: ComponentId) -> Vec<(ContextId, ComponentId, NotificationKind)> {
    let mut out = Vec::new();
    let Some(ids) = self.interest.get(&trigger) else {
      return out;
    };
    for &cid in ids {
      let ctx = self.contexts.get(&cid).expect("interest index only names registered contexts");
      if ctx.is_matching(entity) {
        out.push((cid, trigger, NotificationKind::Modified));
      }
    }
    out
  }

  /// Route an activate/deactivate event across every context currently
  /// tracking `entity`, regardless of which component triggered it -- the
  /// active flag belongs to the whole entity, not to one component.
  pub(crate) fn route_activation_event(&mut self, entity: Entity, data: &EntityData, activated: bool) -> Vec<(ContextId, NotificationKind)> {
    let mut candidates: Vec<ContextId> = Vec::new();
    for id in data.components.keys() {
      if let Some(ids) = self.interest.get(id) {
        for &cid in ids {
          if !candidates.contains(&cid) {
            candidates.push(cid);
          }
        }
      }
    }

    let mut out = Vec::new();
    for cid in candidates {
      let ctx = self.contexts.get_mut(&cid).expect("interest index only names registered contexts");
      if !ctx.is_matching(entity) {
        continue;
      }
      if activated {
        if ctx.deactivated.shift_remove(&entity) {
          ctx.active.insert(entity);
          ctx.invalidate();
          out.push((cid, NotificationKind::Enabled));
        }
      } else if ctx.active.shift_remove(&entity) {
        ctx.deactivated.insert(entity);
        ctx.invalidate();
        out.push((cid, NotificationKind::Disabled));
      }
    }
    out
  }

  /// Drop `entity` from every context's sets, without emitting anything --
  /// used once an entity's removal notifications have already been routed
  /// through [`Self::route_presence_event`] and the slot is being reclaimed.
  pub(crate) fn forget(&mut self, entity: Entity) {
    for ctx in self.contexts.values_mut() {
      let removed = ctx.active.shift_remove(&entity) | ctx.deactivated.shift_remove(&entity);
      if removed {
        ctx.invalidate();
      }
    }
  }
}
