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
//! Entity store
//!
//! The store owns every entity slot, the component registry and the query
//! index, and is the only way to mutate any of them. Every attach or detach
//! updates query membership before returning, so a system never observes a
//! query that disagrees with the entities' components.
//!
//! # Removal
//!
//! Removal happens in two phases. The *logical* phase runs immediately: the
//! component (or the whole entity) leaves every query, and the data moves to
//! a staging map where [`EntityStore::get_removed_component`] can still read
//! it. The *physical* phase returns instances to their pools and the slot to
//! the entity pool; it runs either at once (`immediate = true`) or in bulk
//! when the caller invokes [`EntityStore::process_deferred_removal`].
//!
//! # Example
//!
//! ```
//! use reactive_ecs::ecs::{Component, ComponentSchema, EntityStore, Term};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Fuel(u32);
//!
//! impl Component for Fuel {
//!     fn schema() -> ComponentSchema<Self> {
//!         ComponentSchema::pooled().cloneable()
//!     }
//! }
//!
//! let mut store = EntityStore::new();
//! let ship = store.create_entity();
//! store.add_component(ship, Some(Fuel(10))).unwrap();
//!
//! let fueled = store.resolve_query(&[Term::with::<Fuel>()]).unwrap();
//! assert_eq!(store.query_entities(fueled), &[ship]);
//!
//! store.remove_component::<Fuel>(ship, false).unwrap();
//! assert!(store.query_entities(fueled).is_empty());
//! assert_eq!(store.get_removed_component::<Fuel>(ship), Some(&Fuel(10)));
//!
//! store.process_deferred_removal();
//! assert_eq!(store.get_removed_component::<Fuel>(ship), None);
//! ```

use crate::ecs::component::{Component, ComponentId, ComponentRef, ComponentRegistry, ComponentSchema};
use crate::ecs::entity::{Entity, EntityRecord, EntityState};
use crate::ecs::query::{Query, QueryId, QueryIndex, QueryKey, Term};
use crate::error::{EcsError, EcsResult};
use crate::pool::{PoolConfig, PoolStats};
use tracing::trace;

/// What a call to [`EntityStore::process_deferred_removal`] released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Entity slots returned to the entity pool
    pub entities: usize,
    /// Component instances returned to their pools
    pub components: usize,
}

impl FlushSummary {
    /// Whether nothing was released
    pub fn is_empty(&self) -> bool {
        self.entities == 0 && self.components == 0
    }
}

/// Owner of all entities, their components and the queries over them
pub struct EntityStore {
    records: Vec<EntityRecord>,
    free_slots: Vec<usize>,
    alive: usize,
    slot_hits: usize,
    slot_misses: usize,
    components: ComponentRegistry,
    queries: QueryIndex,
    entities_to_remove: Vec<Entity>,
    components_to_remove: Vec<Entity>,
}

impl EntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_pools(0, PoolConfig::default())
    }

    /// Create a store with `entity_pool_size` pre-allocated slots and a
    /// default configuration for component pools
    pub fn with_pools(entity_pool_size: usize, component_pool: PoolConfig) -> Self {
        let records = (0..entity_pool_size).map(|_| EntityRecord::new()).collect();
        EntityStore {
            records,
            free_slots: (0..entity_pool_size).rev().collect(),
            alive: 0,
            slot_hits: 0,
            slot_misses: 0,
            components: ComponentRegistry::new(component_pool),
            queries: QueryIndex::new(),
            entities_to_remove: Vec::new(),
            components_to_remove: Vec::new(),
        }
    }

    /// Create a new entity with no components
    pub fn create_entity(&mut self) -> Entity {
        let index = match self.free_slots.pop() {
            Some(index) => {
                self.slot_hits += 1;
                index
            }
            None => {
                self.slot_misses += 1;
                self.records.push(EntityRecord::new());
                self.records.len() - 1
            }
        };

        let record = &mut self.records[index];
        record.state = EntityState::Active;
        let entity = record.handle(index);
        self.alive += 1;
        self.queries.on_entity_created(entity, record);
        entity
    }

    /// Create a new entity that can be found again with [`entity_by_name`](Self::entity_by_name)
    pub fn create_named_entity(&mut self, name: impl Into<String>) -> Entity {
        let entity = self.create_entity();
        self.records[entity.index()].name = Some(name.into());
        entity
    }

    /// First live entity carrying `name`
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.records
            .iter()
            .enumerate()
            .find(|(_, r)| r.is_active() && r.name.as_deref() == Some(name))
            .map(|(index, r)| r.handle(index))
    }

    /// Name given at creation, if any
    pub fn entity_name(&self, entity: Entity) -> Option<&str> {
        self.slot(entity)
            .and_then(|index| self.records[index].name.as_deref())
    }

    /// Whether the entity exists and has not been removed
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slot(entity)
            .map(|index| self.records[index].is_active())
            .unwrap_or(false)
    }

    /// Lifecycle state of the entity; `None` for stale handles
    pub fn entity_state(&self, entity: Entity) -> Option<EntityState> {
        self.slot(entity).map(|index| self.records[index].state)
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.alive
    }

    /// Iterate over every live entity
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active())
            .map(|(index, r)| r.handle(index))
    }

    /// Slot counters of the entity pool
    pub fn entity_pool_stats(&self) -> PoolStats {
        let free = self.free_slots.len();
        PoolStats {
            total: self.records.len(),
            free,
            used: self.records.len() - free,
            hits: self.slot_hits,
            misses: self.slot_misses,
            resize_count: self.slot_misses,
            peak_used: self.records.len(),
        }
    }

    /// Entities logically removed and waiting for the next flush
    pub fn pending_entity_removals(&self) -> usize {
        self.entities_to_remove.len()
    }

    /// Register `T` with its own schema
    pub fn register_component<T: Component>(&mut self) -> EcsResult<ComponentId> {
        self.components.register::<T>()
    }

    /// Register `T` with an explicit schema
    pub fn register_component_with<T: Component>(
        &mut self,
        schema: ComponentSchema<T>,
    ) -> EcsResult<ComponentId> {
        self.components.register_with(schema)
    }

    /// Id of `T` if it has been registered
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.id_of::<T>()
    }

    /// The component registry
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub(crate) fn resolve_component(&mut self, component: ComponentRef) -> EcsResult<ComponentId> {
        component.resolve(&mut self.components)
    }

    /// Attach `T` to `entity`, optionally copying `initial` over the defaults
    ///
    /// Re-attaching a type the entity already holds reinitializes the
    /// existing instance from defaults and reports it as changed.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        initial: Option<T>,
    ) -> EcsResult<&mut Self> {
        self.attach(entity, move |registry, id, target: &mut T| {
            if let Some(values) = initial {
                registry.apply_initial(id, target, values);
            }
        })
    }

    /// Attach `T` to `entity` and initialize it in place
    pub fn add_component_with<T: Component>(
        &mut self,
        entity: Entity,
        init: impl FnOnce(&mut T),
    ) -> EcsResult<&mut Self> {
        self.attach(entity, move |_, _, target: &mut T| init(target))
    }

    fn attach<T: Component>(
        &mut self,
        entity: Entity,
        init: impl FnOnce(&ComponentRegistry, ComponentId, &mut T),
    ) -> EcsResult<&mut Self> {
        let index = self.active_slot(entity)?;
        let id = self.components.ensure::<T>()?;
        let record = &mut self.records[index];

        if record.has(id) {
            if let Some(existing) = record.components.get_mut(&id).and_then(|c| c.downcast_mut::<T>()) {
                self.components.reinitialize(id, existing);
                init(&self.components, id, existing);
            }
            self.queries.on_component_mutated(entity, record, id);
            return Ok(self);
        }

        let mut instance = self.components.acquire::<T>(id)?;
        init(&self.components, id, &mut *instance);

        if let Some(staged) = record.removed.remove(&id) {
            self.components.release(id, staged);
        }
        record.components.insert(id, instance);
        self.queries.reconcile(entity, record, id);
        Ok(self)
    }

    /// Detach `T` from `entity`
    ///
    /// Returns whether the entity held the component. Unless `immediate`
    /// is set, the value stays readable through
    /// [`get_removed_component`](Self::get_removed_component) until the
    /// next [`process_deferred_removal`](Self::process_deferred_removal).
    pub fn remove_component<T: Component>(
        &mut self,
        entity: Entity,
        immediate: bool,
    ) -> EcsResult<bool> {
        let index = self.active_slot(entity)?;
        match self.components.id_of::<T>() {
            Some(id) => Ok(self.detach(index, entity, id, immediate)),
            None => Ok(false),
        }
    }

    /// Detach the component with id `component` from `entity`
    pub fn remove_component_by_id(
        &mut self,
        entity: Entity,
        component: ComponentId,
        immediate: bool,
    ) -> EcsResult<bool> {
        let index = self.active_slot(entity)?;
        Ok(self.detach(index, entity, component, immediate))
    }

    /// Detach every component from `entity`, returning how many were attached
    pub fn remove_all_components(&mut self, entity: Entity, immediate: bool) -> EcsResult<usize> {
        let index = self.active_slot(entity)?;
        let mut ids: Vec<ComponentId> = self.records[index].components.keys().copied().collect();
        ids.sort_unstable();

        Ok(ids
            .into_iter()
            .filter(|&id| self.detach(index, entity, id, immediate))
            .count())
    }

    fn detach(&mut self, index: usize, entity: Entity, id: ComponentId, immediate: bool) -> bool {
        let record = &mut self.records[index];
        let Some(instance) = record.components.remove(&id) else {
            return false;
        };
        self.queries.reconcile(entity, record, id);

        if immediate {
            self.components.release(id, instance);
        } else {
            if record.removed.is_empty() {
                self.components_to_remove.push(entity);
            }
            if let Some(previous) = record.removed.insert(id, instance) {
                self.components.release(id, previous);
            }
        }
        true
    }

    /// Remove `entity` from every query and stop treating it as alive
    ///
    /// With `immediate` the components and the slot are released at once;
    /// otherwise the components stay readable as removed components until
    /// the next [`process_deferred_removal`](Self::process_deferred_removal).
    pub fn remove_entity(&mut self, entity: Entity, immediate: bool) -> EcsResult<()> {
        let index = self.active_slot(entity)?;
        let record = &mut self.records[index];
        record.state = EntityState::PendingRemoval;
        self.alive -= 1;
        self.queries.on_entity_removed(entity, record);

        if immediate {
            self.release_slot(index);
        } else {
            record.removed.extend(record.components.drain());
            self.entities_to_remove.push(entity);
        }
        Ok(())
    }

    /// Physically release everything staged by deferred removals
    ///
    /// Queued entity removals are processed first, then queued component
    /// removals. Calling this twice in a row releases nothing the second time.
    pub fn process_deferred_removal(&mut self) -> FlushSummary {
        let mut summary = FlushSummary::default();

        for entity in std::mem::take(&mut self.entities_to_remove) {
            let Some(index) = self.slot(entity) else {
                continue;
            };
            if self.records[index].state == EntityState::PendingRemoval {
                summary.components += self.records[index].removed.len();
                summary.entities += 1;
                self.release_slot(index);
            }
        }

        for entity in std::mem::take(&mut self.components_to_remove) {
            let Some(index) = self.slot(entity) else {
                continue;
            };
            for (id, instance) in self.records[index].removed.drain() {
                self.components.release(id, instance);
                summary.components += 1;
            }
        }

        if !summary.is_empty() {
            trace!(
                entities = summary.entities,
                components = summary.components,
                "processed deferred removals"
            );
        }
        summary
    }

    fn release_slot(&mut self, index: usize) {
        let record = &mut self.records[index];
        for (id, instance) in record.components.drain().chain(record.removed.drain()) {
            self.components.release(id, instance);
        }
        record.queries.clear();
        record.name = None;
        record.state = EntityState::Free;
        record.generation = record.generation.wrapping_add(1);
        self.free_slots.push(index);
    }

    /// The attached `T`, or `None` when absent or only staged for removal
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let index = self.slot(entity)?;
        self.records[index].components.get(&id)?.downcast_ref::<T>()
    }

    /// The attached `T`, falling back to a logically removed one
    pub fn get_component_including_removed<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let record = &self.records[self.slot(entity)?];
        record
            .components
            .get(&id)
            .or_else(|| record.removed.get(&id))?
            .downcast_ref::<T>()
    }

    /// The logically removed `T` that has not been released yet
    pub fn get_removed_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id_of::<T>()?;
        let index = self.slot(entity)?;
        self.records[index].removed.get(&id)?.downcast_ref::<T>()
    }

    /// Mutable access to the attached `T`
    ///
    /// This is the only way mutations become visible to changed-listeners:
    /// the entity is reported as changed to every reactive query it matches
    /// that includes `T`, whether or not the caller actually writes.
    pub fn get_mutable_component<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.components.id_of::<T>()?;
        let index = self.slot(entity)?;
        let record = &mut self.records[index];
        if !record.is_active() || !record.has(id) {
            return None;
        }

        self.queries.on_component_mutated(entity, record, id);
        record.components.get_mut(&id)?.downcast_mut::<T>()
    }

    /// Whether `T` is attached
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.components.id_of::<T>(), self.slot(entity)) {
            (Some(id), Some(index)) => self.records[index].has(id),
            _ => false,
        }
    }

    /// Whether a logically removed `T` is waiting to be released
    pub fn has_removed_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.components.id_of::<T>(), self.slot(entity)) {
            (Some(id), Some(index)) => self.records[index].removed.contains_key(&id),
            _ => false,
        }
    }

    /// Whether every listed type is attached
    pub fn has_all_components(&self, entity: Entity, components: &[ComponentRef]) -> bool {
        let Some(index) = self.slot(entity) else {
            return false;
        };
        let record = &self.records[index];
        components.iter().all(|c| {
            self.components
                .id_of_type(c.type_id())
                .map(|id| record.has(id))
                .unwrap_or(false)
        })
    }

    /// Whether at least one listed type is attached
    pub fn has_any_components(&self, entity: Entity, components: &[ComponentRef]) -> bool {
        let Some(index) = self.slot(entity) else {
            return false;
        };
        let record = &self.records[index];
        components.iter().any(|c| {
            self.components
                .id_of_type(c.type_id())
                .map(|id| record.has(id))
                .unwrap_or(false)
        })
    }

    /// Ids of the attached components, sorted
    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = match self.slot(entity) {
            Some(index) => self.records[index].components.keys().copied().collect(),
            None => Vec::new(),
        };
        ids.sort_unstable();
        ids
    }

    /// Resolve the shared query for `terms`, creating it if needed
    ///
    /// Unregistered component types are registered on the way.
    pub fn resolve_query(&mut self, terms: &[Term]) -> EcsResult<QueryId> {
        if terms.is_empty() {
            return Err(EcsError::EmptyQuery {
                query: "<anonymous>".to_string(),
            });
        }

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for term in terms {
            let id = term.component().resolve(&mut self.components)?;
            if term.is_negated() {
                exclude.push(id);
            } else {
                include.push(id);
            }
        }

        let key = QueryKey::new(include, exclude);
        Ok(self.queries.get_or_create(key, &mut self.records))
    }

    /// Look up a query
    pub fn query(&self, id: QueryId) -> Option<&Query> {
        self.queries.get(id)
    }

    /// Entities matching a query; empty for unknown ids
    pub fn query_entities(&self, id: QueryId) -> &[Entity] {
        self.queries.get(id).map(Query::entities).unwrap_or(&[])
    }

    /// The query index
    pub fn queries(&self) -> &QueryIndex {
        &self.queries
    }

    pub(crate) fn queries_mut(&mut self) -> &mut QueryIndex {
        &mut self.queries
    }

    fn slot(&self, entity: Entity) -> Option<usize> {
        let index = entity.index();
        let record = self.records.get(index)?;
        if record.generation == entity.generation() && record.state != EntityState::Free {
            Some(index)
        } else {
            None
        }
    }

    fn active_slot(&self, entity: Entity) -> EcsResult<usize> {
        match self.slot(entity) {
            Some(index) if self.records[index].is_active() => Ok(index),
            _ => Err(EcsError::DeadEntity(entity)),
        }
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
