// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Incrementally maintained queries
//!
//! A query is identified by its signature: the sorted set of component types
//! an entity must hold plus the sorted set it must not hold. Every caller
//! asking for the same signature shares one [`Query`] and therefore one
//! membership list and one event stream.
//!
//! Membership is updated synchronously on every attach and detach. A
//! component→queries index picks the queries a mutation can affect, and each
//! entity keeps back-references to the queries it currently belongs to, so
//! maintenance never scans all queries or all entities. The only full scan is
//! the one-time back-fill when a query is first created.
//!
//! Consumers observe membership transitions through listeners. Each listener
//! buffers entities until it is cleared, which the scheduler does after the
//! owning system runs.

use crate::ecs::component::{ComponentId, ComponentRef};
use crate::ecs::entity::{Entity, EntityRecord};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Entity count above which a new query is back-filled with a parallel scan
#[cfg(feature = "parallel")]
pub const PARALLEL_BACKFILL_THRESHOLD: usize = 4096;

/// One element of a query's component list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Term {
    component: ComponentRef,
    negated: bool,
}

impl Term {
    /// Entities must hold `T`
    pub fn with<T: crate::ecs::Component>() -> Self {
        Term {
            component: ComponentRef::of::<T>(),
            negated: false,
        }
    }

    /// Entities must not hold `T`
    pub fn not<T: crate::ecs::Component>() -> Self {
        Term {
            component: ComponentRef::of::<T>(),
            negated: true,
        }
    }

    /// The referenced component type
    pub fn component(&self) -> ComponentRef {
        self.component
    }

    /// Whether this term excludes its component
    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

/// Canonical signature of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    include: Vec<ComponentId>,
    exclude: Vec<ComponentId>,
}

impl QueryKey {
    /// Build a key; both lists are sorted and deduplicated
    pub fn new(mut include: Vec<ComponentId>, mut exclude: Vec<ComponentId>) -> Self {
        include.sort_unstable();
        include.dedup();
        exclude.sort_unstable();
        exclude.dedup();
        QueryKey { include, exclude }
    }

    /// Component types an entity must hold
    pub fn include(&self) -> &[ComponentId] {
        &self.include
    }

    /// Component types an entity must not hold
    pub fn exclude(&self) -> &[ComponentId] {
        &self.exclude
    }

    /// Whether `component` appears on either side of the signature
    pub fn references(&self, component: ComponentId) -> bool {
        self.include.binary_search(&component).is_ok()
            || self.exclude.binary_search(&component).is_ok()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let parts = self
            .include
            .iter()
            .map(|c| (c, ""))
            .chain(self.exclude.iter().map(|c| (c, "!")));
        for (component, prefix) in parts {
            if !first {
                f.write_str("-")?;
            }
            write!(f, "{}{}", prefix, component)?;
            first = false;
        }
        Ok(())
    }
}

/// Index of a query inside the [`QueryIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub(crate) usize);

/// Index of a listener inside the [`QueryIndex`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Which component mutations a changed-listener reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Any included component of the query
    Any,
    /// Only these component types
    Components(Vec<ComponentId>),
}

impl ChangeFilter {
    fn accepts(&self, component: ComponentId) -> bool {
        match self {
            ChangeFilter::Any => true,
            ChangeFilter::Components(components) => components.contains(&component),
        }
    }
}

/// Event stream a listener subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerKind {
    /// Entities that started matching
    Added,
    /// Entities that stopped matching
    Removed,
    /// Member entities whose component was mutated
    Changed(ChangeFilter),
}

struct Listener {
    query: QueryId,
    kind: ListenerKind,
    buffer: Vec<Entity>,
    seen: HashSet<Entity>,
}

#[derive(Clone, Copy)]
enum Transition {
    Added,
    Removed,
}

/// A shared, incrementally maintained set of matching entities
pub struct Query {
    key: QueryKey,
    entities: Vec<Entity>,
    /// Index of each member in `entities`
    positions: HashMap<Entity, usize>,
    listeners: Vec<ListenerId>,
    reactive: bool,
}

impl Query {
    fn new(key: QueryKey) -> Self {
        Query {
            key,
            entities: Vec::new(),
            positions: HashMap::new(),
            listeners: Vec::new(),
            reactive: false,
        }
    }

    /// The query's signature
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Matching entities
    ///
    /// Entities are appended as they start matching. A removal moves the
    /// last member into the vacated position, so the order is not stable
    /// across removals.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of matching entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity matches
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether `entity` currently matches
    pub fn contains(&self, entity: Entity) -> bool {
        self.positions.contains_key(&entity)
    }

    /// Whether some listener tracks component mutations on this query
    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    /// Diagnostics snapshot
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            key: self.key.to_string(),
            included: self.key.include.len(),
            excluded: self.key.exclude.len(),
            entities: self.entities.len(),
            listeners: self.listeners.len(),
            reactive: self.reactive,
        }
    }

    pub(crate) fn matches(&self, record: &EntityRecord) -> bool {
        record.is_active()
            && self.key.include.iter().all(|&c| record.has(c))
            && !self.key.exclude.iter().any(|&c| record.has(c))
    }

    fn insert_entity(&mut self, entity: Entity) {
        self.positions.insert(entity, self.entities.len());
        self.entities.push(entity);
    }

    fn remove_entity(&mut self, entity: Entity) {
        let Some(pos) = self.positions.remove(&entity) else {
            return;
        };
        self.entities.swap_remove(pos);
        if let Some(&moved) = self.entities.get(pos) {
            self.positions.insert(moved, pos);
        }
    }
}

/// Diagnostics for one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStats {
    /// Rendered signature
    pub key: String,
    /// Number of included component types
    pub included: usize,
    /// Number of negated component types
    pub excluded: usize,
    /// Number of matching entities
    pub entities: usize,
    /// Number of subscribed listeners
    pub listeners: usize,
    /// Whether mutations are tracked
    pub reactive: bool,
}

/// Registry of every query, keyed by signature
#[derive(Default)]
pub struct QueryIndex {
    queries: Vec<Query>,
    by_key: HashMap<QueryKey, QueryId>,
    by_component: HashMap<ComponentId, Vec<QueryId>>,
    /// Queries with no included component; new entities may match them
    unconstrained: Vec<QueryId>,
    listeners: Vec<Option<Listener>>,
    free_listeners: Vec<ListenerId>,
}

impl QueryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a query
    pub fn get(&self, id: QueryId) -> Option<&Query> {
        self.queries.get(id.0)
    }

    /// Id of the query with this signature, if it exists
    pub fn find(&self, key: &QueryKey) -> Option<QueryId> {
        self.by_key.get(key).copied()
    }

    /// Number of distinct queries
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether no query exists
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Iterate over every query with its id
    pub fn iter(&self) -> impl Iterator<Item = (QueryId, &Query)> {
        self.queries.iter().enumerate().map(|(i, q)| (QueryId(i), q))
    }

    /// Diagnostics for every query
    pub fn stats(&self) -> Vec<QueryStats> {
        self.queries.iter().map(Query::stats).collect()
    }

    /// Return the query for `key`, creating and back-filling it if needed
    ///
    /// An empty key is accepted here; callers validate term lists first.
    pub(crate) fn get_or_create(&mut self, key: QueryKey, records: &mut [EntityRecord]) -> QueryId {
        if let Some(&id) = self.by_key.get(&key) {
            return id;
        }

        let id = QueryId(self.queries.len());
        let mut query = Query::new(key.clone());

        for index in matching_slots(&query, records) {
            let record = &mut records[index];
            query.insert_entity(record.handle(index));
            record.queries.push(id);
        }

        for &component in key.include.iter().chain(key.exclude.iter()) {
            self.by_component.entry(component).or_default().push(id);
        }
        if key.include.is_empty() {
            self.unconstrained.push(id);
        }

        debug!(query = %key, matched = query.entities.len(), "created query");

        self.queries.push(query);
        self.by_key.insert(key, id);
        id
    }

    /// Match a freshly created, component-less entity
    pub(crate) fn on_entity_created(&mut self, entity: Entity, record: &mut EntityRecord) {
        for &id in &self.unconstrained {
            let query = &mut self.queries[id.0];
            if query.matches(record) {
                query.insert_entity(entity);
                record.queries.push(id);
                notify(&mut self.listeners, query, entity, Transition::Added);
            }
        }
    }

    /// Re-evaluate every query that references `component` after it was
    /// attached to or detached from `entity`
    pub(crate) fn reconcile(
        &mut self,
        entity: Entity,
        record: &mut EntityRecord,
        component: ComponentId,
    ) {
        let Some(candidates) = self.by_component.get(&component) else {
            return;
        };

        for &id in candidates {
            let query = &mut self.queries[id.0];
            let should_match = query.matches(record);
            let is_member = record.in_query(id);

            if should_match && !is_member {
                query.insert_entity(entity);
                record.queries.push(id);
                notify(&mut self.listeners, query, entity, Transition::Added);
            } else if !should_match && is_member {
                query.remove_entity(entity);
                record.forget_query(id);
                notify(&mut self.listeners, query, entity, Transition::Removed);
            }
        }
    }

    /// Drop `entity` from every query it matched
    pub(crate) fn on_entity_removed(&mut self, entity: Entity, record: &mut EntityRecord) {
        for id in record.queries.drain(..) {
            let query = &mut self.queries[id.0];
            query.remove_entity(entity);
            notify(&mut self.listeners, query, entity, Transition::Removed);
        }
    }

    /// Report a mutation of `component` on `entity` to reactive queries
    pub(crate) fn on_component_mutated(
        &mut self,
        entity: Entity,
        record: &EntityRecord,
        component: ComponentId,
    ) {
        for &id in &record.queries {
            let query = &self.queries[id.0];
            if !query.reactive || query.key.include.binary_search(&component).is_err() {
                continue;
            }

            for &listener_id in &query.listeners {
                let Some(listener) = self.listeners[listener_id.0].as_mut() else {
                    continue;
                };
                let interested = match &listener.kind {
                    ListenerKind::Changed(filter) => filter.accepts(component),
                    _ => false,
                };
                if interested && listener.seen.insert(entity) {
                    listener.buffer.push(entity);
                }
            }
        }
    }

    /// Subscribe a new listener to `query`
    pub(crate) fn subscribe(&mut self, query: QueryId, kind: ListenerKind) -> ListenerId {
        if matches!(kind, ListenerKind::Changed(_)) {
            self.queries[query.0].reactive = true;
        }
        let listener = Some(Listener {
            query,
            kind,
            buffer: Vec::new(),
            seen: HashSet::new(),
        });
        let id = match self.free_listeners.pop() {
            Some(id) => {
                self.listeners[id.0] = listener;
                id
            }
            None => {
                self.listeners.push(listener);
                ListenerId(self.listeners.len() - 1)
            }
        };
        self.queries[query.0].listeners.push(id);
        id
    }

    /// Remove a listener and its buffered events
    pub(crate) fn unsubscribe(&mut self, id: ListenerId) {
        let Some(listener) = self.listeners.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        self.free_listeners.push(id);

        let query = &mut self.queries[listener.query.0];
        query.listeners.retain(|&l| l != id);
        let listeners = &self.listeners;
        query.reactive = query.listeners.iter().any(|l| {
            matches!(
                listeners[l.0].as_ref().map(|l| &l.kind),
                Some(ListenerKind::Changed(_))
            )
        });
    }

    /// Entities buffered by a listener since it was last cleared
    pub fn events(&self, id: ListenerId) -> &[Entity] {
        self.listeners
            .get(id.0)
            .and_then(Option::as_ref)
            .map(|l| l.buffer.as_slice())
            .unwrap_or(&[])
    }

    /// Empty a listener's buffer
    pub(crate) fn clear(&mut self, id: ListenerId) {
        if let Some(listener) = self.listeners.get_mut(id.0).and_then(Option::as_mut) {
            listener.buffer.clear();
            listener.seen.clear();
        }
    }
}

fn notify(listeners: &mut [Option<Listener>], query: &Query, entity: Entity, transition: Transition) {
    for &id in &query.listeners {
        if let Some(listener) = listeners[id.0].as_mut() {
            match (&listener.kind, transition) {
                (ListenerKind::Added, Transition::Added)
                | (ListenerKind::Removed, Transition::Removed) => listener.buffer.push(entity),
                _ => {}
            }
        }
    }
}

#[cfg(feature = "parallel")]
fn matching_slots(query: &Query, records: &[EntityRecord]) -> Vec<usize> {
    use rayon::prelude::*;

    if records.len() < PARALLEL_BACKFILL_THRESHOLD {
        return sequential_matching_slots(query, records);
    }
    records
        .par_iter()
        .enumerate()
        .filter(|(_, record)| query.matches(record))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn matching_slots(query: &Query, records: &[EntityRecord]) -> Vec<usize> {
    sequential_matching_slots(query, records)
}

fn sequential_matching_slots(query: &Query, records: &[EntityRecord]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| query.matches(record))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::EntityState;

    const A: ComponentId = ComponentId(0);
    const B: ComponentId = ComponentId(1);
    const C: ComponentId = ComponentId(2);

    fn active(components: &[ComponentId]) -> EntityRecord {
        let mut record = EntityRecord::new();
        record.state = EntityState::Active;
        for &c in components {
            record.components.insert(c, Box::new(()));
        }
        record
    }

    fn attach(index: &mut QueryIndex, records: &mut [EntityRecord], slot: usize, c: ComponentId) {
        let entity = records[slot].handle(slot);
        records[slot].components.insert(c, Box::new(()));
        index.reconcile(entity, &mut records[slot], c);
    }

    fn detach(index: &mut QueryIndex, records: &mut [EntityRecord], slot: usize, c: ComponentId) {
        let entity = records[slot].handle(slot);
        records[slot].components.remove(&c);
        index.reconcile(entity, &mut records[slot], c);
    }

    #[test]
    fn test_key_is_canonical() {
        let k1 = QueryKey::new(vec![B, A, A], vec![C]);
        let k2 = QueryKey::new(vec![A, B], vec![C, C]);
        assert_eq!(k1, k2);
        assert_eq!(k1.to_string(), "0-1-!2");
        assert!(k1.references(C));
        assert_ne!(QueryKey::new(vec![A], vec![B]), QueryKey::new(vec![A, B], vec![]));
    }

    #[test]
    fn test_same_key_shares_query() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[A])];
        let q1 = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        let q2 = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        assert_eq!(q1, q2);
        assert_eq!(index.len(), 1);
        assert_eq!(records[0].queries, vec![q1]);
    }

    #[test]
    fn test_backfill_matches_existing_entities() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[A]), active(&[A, B]), active(&[B]), EntityRecord::new()];

        let q = index.get_or_create(QueryKey::new(vec![A], vec![B]), &mut records);
        let query = index.get(q).unwrap();
        assert_eq!(query.entities(), &[records[0].handle(0)]);
        assert!(records[0].in_query(q));
        assert!(!records[1].in_query(q));
    }

    #[test]
    fn test_incremental_membership_and_events() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[]), active(&[])];
        let q = index.get_or_create(QueryKey::new(vec![A], vec![B]), &mut records);
        let added = index.subscribe(q, ListenerKind::Added);
        let removed = index.subscribe(q, ListenerKind::Removed);

        attach(&mut index, &mut records, 0, A);
        attach(&mut index, &mut records, 1, A);
        assert_eq!(index.get(q).unwrap().len(), 2);
        assert_eq!(index.events(added).len(), 2);

        // Negated component knocks the entity out
        attach(&mut index, &mut records, 0, B);
        assert_eq!(index.get(q).unwrap().entities(), &[records[1].handle(1)]);
        assert_eq!(index.events(removed), &[records[0].handle(0)]);

        // Unrelated component never touches the query
        attach(&mut index, &mut records, 1, C);
        assert_eq!(index.events(added).len(), 2);

        detach(&mut index, &mut records, 0, B);
        assert_eq!(index.get(q).unwrap().len(), 2);
        assert_eq!(index.events(added).len(), 3);

        index.clear(added);
        index.clear(removed);
        assert!(index.events(added).is_empty());
        assert!(index.events(removed).is_empty());
    }

    #[test]
    fn test_entity_removal_fires_removed_everywhere() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[A, B])];
        let qa = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        let qb = index.get_or_create(QueryKey::new(vec![B], vec![]), &mut records);
        let ra = index.subscribe(qa, ListenerKind::Removed);
        let rb = index.subscribe(qb, ListenerKind::Removed);

        let entity = records[0].handle(0);
        records[0].state = EntityState::PendingRemoval;
        index.on_entity_removed(entity, &mut records[0]);

        assert!(index.get(qa).unwrap().is_empty());
        assert!(index.get(qb).unwrap().is_empty());
        assert_eq!(index.events(ra), &[entity]);
        assert_eq!(index.events(rb), &[entity]);
        assert!(records[0].queries.is_empty());
    }

    #[test]
    fn test_changed_is_deduplicated_and_filtered() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[A, B])];
        let q = index.get_or_create(QueryKey::new(vec![A, B], vec![]), &mut records);
        assert!(!index.get(q).unwrap().is_reactive());

        let any = index.subscribe(q, ListenerKind::Changed(ChangeFilter::Any));
        let only_b = index.subscribe(q, ListenerKind::Changed(ChangeFilter::Components(vec![B])));
        assert!(index.get(q).unwrap().is_reactive());

        let entity = records[0].handle(0);
        index.on_component_mutated(entity, &records[0], A);
        index.on_component_mutated(entity, &records[0], A);
        assert_eq!(index.events(any), &[entity]);
        assert!(index.events(only_b).is_empty());

        index.on_component_mutated(entity, &records[0], B);
        assert_eq!(index.events(only_b), &[entity]);
        assert_eq!(index.events(any).len(), 1);

        index.clear(any);
        index.on_component_mutated(entity, &records[0], A);
        assert_eq!(index.events(any), &[entity]);
    }

    #[test]
    fn test_changed_ignores_components_outside_query() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[A, C])];
        let q = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        let changed = index.subscribe(q, ListenerKind::Changed(ChangeFilter::Any));

        index.on_component_mutated(records[0].handle(0), &records[0], C);
        assert!(index.events(changed).is_empty());
    }

    #[test]
    fn test_unsubscribe_recomputes_reactivity() {
        let mut index = QueryIndex::new();
        let mut records: Vec<EntityRecord> = Vec::new();
        let q = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        let added = index.subscribe(q, ListenerKind::Added);
        let changed = index.subscribe(q, ListenerKind::Changed(ChangeFilter::Any));

        index.unsubscribe(changed);
        let query = index.get(q).unwrap();
        assert!(!query.is_reactive());
        assert_eq!(query.stats().listeners, 1);
        assert!(index.events(changed).is_empty());

        index.unsubscribe(added);
        index.unsubscribe(added);
        assert_eq!(index.get(q).unwrap().stats().listeners, 0);
    }

    #[test]
    fn test_negation_only_query_tracks_new_entities() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[])];
        let q = index.get_or_create(QueryKey::new(vec![], vec![A]), &mut records);
        assert_eq!(index.get(q).unwrap().len(), 1);

        records.push(active(&[]));
        let entity = records[1].handle(1);
        index.on_entity_created(entity, &mut records[1]);
        assert_eq!(index.get(q).unwrap().len(), 2);

        attach(&mut index, &mut records, 1, A);
        assert_eq!(index.get(q).unwrap().len(), 1);
    }

    #[test]
    fn test_removal_keeps_positions_consistent() {
        let mut index = QueryIndex::new();
        let mut records: Vec<EntityRecord> = (0..64).map(|_| active(&[A])).collect();
        let q = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);

        for slot in (0..64).filter(|s| s % 3 != 1) {
            detach(&mut index, &mut records, slot, A);
        }

        let query = index.get(q).unwrap();
        assert_eq!(query.len(), 21);
        for (pos, &entity) in query.entities().iter().enumerate() {
            assert_eq!(query.positions[&entity], pos);
        }
        for slot in 0..64 {
            assert_eq!(query.contains(records[slot].handle(slot)), slot % 3 == 1);
        }
    }

    #[test]
    fn test_unsubscribed_listener_slots_are_reused() {
        let mut index = QueryIndex::new();
        let mut records = vec![active(&[])];
        let q = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);

        for _ in 0..100 {
            let added = index.subscribe(q, ListenerKind::Added);
            let changed = index.subscribe(q, ListenerKind::Changed(ChangeFilter::Any));
            index.unsubscribe(added);
            index.unsubscribe(changed);
        }
        assert_eq!(index.listeners.len(), 2);

        let added = index.subscribe(q, ListenerKind::Added);
        attach(&mut index, &mut records, 0, A);
        assert_eq!(index.events(added), &[records[0].handle(0)]);
        assert_eq!(index.get(q).unwrap().stats().listeners, 1);
        assert!(!index.get(q).unwrap().is_reactive());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_backfill_preserves_order() {
        let mut index = QueryIndex::new();
        let mut records: Vec<EntityRecord> = (0..PARALLEL_BACKFILL_THRESHOLD * 2)
            .map(|i| if i % 3 == 0 { active(&[A]) } else { active(&[B]) })
            .collect();

        let q = index.get_or_create(QueryKey::new(vec![A], vec![]), &mut records);
        let entities = index.get(q).unwrap().entities();
        assert_eq!(entities.len(), (PARALLEL_BACKFILL_THRESHOLD * 2 + 2) / 3);
        assert!(entities.windows(2).all(|w| w[0] < w[1]));
    }
}
