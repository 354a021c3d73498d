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
//! Entity management
//!
//! Entities are lightweight generational handles into the entity store's
//! arena. The slot behind a handle carries the attached components, the
//! components staged for deferred removal and the queries currently matching
//! the entity. Slots are recycled; the generation makes stale handles miss.

use crate::ecs::component::ComponentId;
use crate::ecs::query::QueryId;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for an entity slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Create a new EntityId from a raw u64 value
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Entity handle with generational index support for safe references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    id: EntityId,
    generation: u32,
}

impl Entity {
    /// Create a new entity with the given ID and generation
    pub fn new(id: u64, generation: u32) -> Self {
        Entity {
            id: EntityId::new(id),
            generation,
        }
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Get the generation number
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn index(&self) -> usize {
        self.id.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.id.0, self.generation)
    }
}

/// Lifecycle state of an entity slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// The slot sits in the entity pool
    Free,
    /// Alive and eligible for queries
    Active,
    /// Logically removed; staged components are readable until the next flush
    PendingRemoval,
}

pub(crate) type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Arena slot backing an [`Entity`] handle
pub(crate) struct EntityRecord {
    pub generation: u32,
    pub state: EntityState,
    pub name: Option<String>,
    /// Currently attached components; the key set is the entity's signature
    pub components: HashMap<ComponentId, BoxedComponent>,
    /// Logically removed components awaiting release
    pub removed: HashMap<ComponentId, BoxedComponent>,
    /// Queries this entity is currently a member of
    pub queries: Vec<QueryId>,
}

impl EntityRecord {
    pub fn new() -> Self {
        EntityRecord {
            generation: 0,
            state: EntityState::Free,
            name: None,
            components: HashMap::new(),
            removed: HashMap::new(),
            queries: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }

    pub fn has(&self, component: ComponentId) -> bool {
        self.components.contains_key(&component)
    }

    /// Handle for this slot at its current generation
    pub fn handle(&self, index: usize) -> Entity {
        Entity::new(index as u64, self.generation)
    }

    pub fn in_query(&self, query: QueryId) -> bool {
        self.queries.contains(&query)
    }

    pub fn forget_query(&mut self, query: QueryId) {
        if let Some(pos) = self.queries.iter().position(|&q| q == query) {
            self.queries.swap_remove(pos);
        }
    }
}
