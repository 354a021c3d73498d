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
//! World management
//!
//! The World is the central container: it owns the [`EntityStore`] and the
//! [`Scheduler`] and drives one tick at a time. Every entity-level operation
//! of the store is reachable directly on the world through `Deref`.

use crate::ecs::component::{Component, ComponentId, ComponentPoolStats};
use crate::ecs::query::QueryStats;
use crate::ecs::scheduler::{Scheduler, SystemId, SystemStats};
use crate::ecs::store::{EntityStore, FlushSummary};
use crate::ecs::system::System;
use crate::ecs::Entity;
use crate::error::EcsResult;
use crate::pool::{PoolConfig, PoolStats};
use std::ops::{Deref, DerefMut};

/// Configuration for a [`World`]
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Entity slots allocated up front
    pub entity_pool_size: usize,
    /// Pool configuration used by component types without their own
    pub component_pool: PoolConfig,
    /// Run [`World::process_deferred_removal`] at the end of every tick
    pub flush_removals_after_execute: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            entity_pool_size: 0,
            component_pool: PoolConfig::default(),
            flush_removals_after_execute: false,
        }
    }
}

impl WorldConfig {
    /// Pre-allocate `size` entity slots
    pub fn with_entity_pool_size(mut self, size: usize) -> Self {
        self.entity_pool_size = size;
        self
    }

    /// Default configuration for component pools
    pub fn with_component_pool(mut self, config: PoolConfig) -> Self {
        self.component_pool = config;
        self
    }

    /// Flush deferred removals automatically after every tick
    pub fn with_flush_after_execute(mut self) -> Self {
        self.flush_removals_after_execute = true;
        self
    }
}

/// Snapshot of a world's diagnostics
#[derive(Debug, Clone)]
pub struct WorldStats {
    /// Live entities
    pub entities: usize,
    /// Entities waiting for the next deferred flush
    pub pending_entity_removals: usize,
    /// Entity slot pool counters
    pub entity_pool: PoolStats,
    /// Every query
    pub queries: Vec<QueryStats>,
    /// Every component pool
    pub pools: Vec<ComponentPoolStats>,
    /// Every system, in execution order
    pub systems: Vec<SystemStats>,
}

/// The main ECS world container
///
/// # Examples
///
/// ```
/// use reactive_ecs::ecs::{Component, ComponentSchema, Term, World};
///
/// #[derive(Debug, Default, Clone)]
/// struct Shield(u8);
///
/// impl Component for Shield {
///     fn schema() -> ComponentSchema<Self> {
///         ComponentSchema::pooled().cloneable()
///     }
/// }
///
/// let mut world = World::new();
/// let e = world.create_entity();
/// world.add_component(e, Some(Shield(3))).unwrap();
///
/// let shielded = world.resolve_query(&[Term::with::<Shield>()]).unwrap();
/// assert_eq!(world.query_entities(shielded).len(), 1);
/// ```
pub struct World {
    store: EntityStore,
    scheduler: Scheduler,
    config: WorldConfig,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world with a custom configuration
    pub fn with_config(config: WorldConfig) -> Self {
        World {
            store: EntityStore::with_pools(config.entity_pool_size, config.component_pool.clone()),
            scheduler: Scheduler::new(),
            config,
        }
    }

    /// The configuration the world was built with
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The entity store
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Mutable access to the entity store
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// Register a component type with its own schema
    pub fn register_component<T: Component>(&mut self) -> EcsResult<ComponentId> {
        self.store.register_component::<T>()
    }

    /// Create a new entity
    pub fn create_entity(&mut self) -> Entity {
        self.store.create_entity()
    }

    /// Register a system at priority 0
    pub fn register_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        self.register_system_with_priority(system, 0)
    }

    /// Register a system; lower priorities run first
    pub fn register_system_with_priority<S: System>(
        &mut self,
        system: S,
        priority: i32,
    ) -> EcsResult<SystemId> {
        self.scheduler.add_system(&mut self.store, system, priority)
    }

    /// Remove a system and its listeners
    pub fn unregister_system(&mut self, id: SystemId) -> EcsResult<()> {
        self.scheduler.remove_system(&mut self.store, id)
    }

    /// Id of the registered system of type `S`
    pub fn system_id<S: System>(&self) -> Option<SystemId> {
        self.scheduler.system_id::<S>()
    }

    /// Enable or disable one system
    pub fn set_system_enabled(&mut self, id: SystemId, enabled: bool) -> EcsResult<()> {
        self.scheduler.set_enabled(id, enabled)
    }

    /// Run every enabled system once
    pub fn execute(&mut self, delta: f64, time: f64) -> EcsResult<()> {
        self.tick(delta, time, false)
    }

    /// Run every system once, including disabled ones
    pub fn execute_forced(&mut self, delta: f64, time: f64) -> EcsResult<()> {
        self.tick(delta, time, true)
    }

    fn tick(&mut self, delta: f64, time: f64, force: bool) -> EcsResult<()> {
        self.scheduler.execute(&mut self.store, delta, time, force)?;
        if self.config.flush_removals_after_execute {
            self.store.process_deferred_removal();
        }
        Ok(())
    }

    /// Disable every system
    pub fn stop(&mut self) {
        self.scheduler.stop_all();
    }

    /// Enable every system
    pub fn play(&mut self) {
        self.scheduler.play_all();
    }

    /// Release everything staged by deferred removals
    pub fn process_deferred_removal(&mut self) -> FlushSummary {
        self.store.process_deferred_removal()
    }

    /// Diagnostics snapshot
    pub fn stats(&self) -> WorldStats {
        WorldStats {
            entities: self.store.entity_count(),
            pending_entity_removals: self.store.pending_entity_removals(),
            entity_pool: self.store.entity_pool_stats(),
            queries: self.store.queries().stats(),
            pools: self.store.components().stats(),
            systems: self.scheduler.stats(&self.store),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for World {
    type Target = EntityStore;

    fn deref(&self) -> &EntityStore {
        &self.store
    }
}

impl DerefMut for World {
    fn deref_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }
}
