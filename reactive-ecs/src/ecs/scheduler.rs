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
//! System scheduler with priority ordering
//!
//! Systems execute sequentially in ascending priority; systems sharing a
//! priority run in registration order. Each system sees the events its own
//! listeners buffered since it last ran, and those buffers are cleared right
//! after a successful run.
//!
//! # Examples
//!
//! ```
//! use reactive_ecs::ecs::{EntityStore, Scheduler, System, SystemContext};
//! use reactive_ecs::error::SystemResult;
//!
//! struct Tick(u32);
//! impl System for Tick {
//!     fn run(&mut self, _ctx: &mut SystemContext<'_>) -> SystemResult {
//!         self.0 += 1;
//!         Ok(())
//!     }
//! }
//!
//! let mut store = EntityStore::new();
//! let mut scheduler = Scheduler::new();
//! scheduler.add_system(&mut store, Tick(0), 0).unwrap();
//! scheduler.execute(&mut store, 1.0 / 60.0, 0.0, false).unwrap();
//! ```

use crate::ecs::query::{ChangeFilter, ListenerKind};
use crate::ecs::store::EntityStore;
use crate::ecs::system::{QueryBinding, QueryDef, System, SystemContext};
use crate::error::{EcsError, EcsResult};
use std::any::TypeId;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifier of a registered system, stable for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(u32);

impl SystemId {
    /// Registration sequence number
    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Per-query diagnostics of a system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemQueryStats {
    /// Name the system declared the query under
    pub name: &'static str,
    /// Number of entities currently matching
    pub entities: usize,
    /// Whether an empty result skips the system
    pub mandatory: bool,
}

/// Diagnostics for one registered system
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    /// System id
    pub id: SystemId,
    /// System name
    pub name: String,
    /// Whether the system runs on unforced ticks
    pub enabled: bool,
    /// Execution priority; lower runs first
    pub priority: i32,
    /// Duration of the most recent run
    pub last_duration: Option<Duration>,
    /// Number of completed runs
    pub runs: u64,
    /// Declared queries
    pub queries: Vec<SystemQueryStats>,
}

/// A system with metadata for scheduling
struct ScheduledSystem {
    id: SystemId,
    type_id: TypeId,
    name: String,
    system: Box<dyn System>,
    priority: i32,
    enabled: bool,
    bindings: Vec<QueryBinding>,
    last_duration: Option<Duration>,
    runs: u64,
}

impl ScheduledSystem {
    fn can_run(&self, store: &EntityStore) -> bool {
        self.bindings
            .iter()
            .filter(|b| b.mandatory)
            .all(|b| !store.query_entities(b.query).is_empty())
    }
}

/// Sequential system scheduler
pub struct Scheduler {
    systems: Vec<ScheduledSystem>,
    next_id: u32,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Scheduler {
            systems: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a system
    ///
    /// Resolves the system's declared queries against `store`, subscribes
    /// the requested listeners and runs the system's `init` hook. Registering
    /// a second system of the same type logs a warning and returns the id of
    /// the first one.
    pub fn add_system<S: System>(
        &mut self,
        store: &mut EntityStore,
        mut system: S,
        priority: i32,
    ) -> EcsResult<SystemId> {
        let type_id = TypeId::of::<S>();
        if let Some(existing) = self.systems.iter().find(|s| s.type_id == type_id) {
            warn!(system = %existing.name, "system type already registered");
            return Ok(existing.id);
        }

        let name = system.name().to_string();
        let defs = system.queries();
        if let Some(def) = defs.iter().find(|d| d.terms.is_empty()) {
            return Err(EcsError::EmptyQuery {
                query: format!("{}::{}", name, def.name),
            });
        }

        let bindings = Self::bind(store, defs)?;

        if let Err(source) = system.init(store) {
            for binding in &bindings {
                for listener in binding.listeners() {
                    store.queries_mut().unsubscribe(listener);
                }
            }
            return Err(EcsError::SystemFailed { system: name, source });
        }

        let id = SystemId(self.next_id);
        self.next_id += 1;

        debug!(system = %name, priority, queries = bindings.len(), "registered system");

        self.systems.push(ScheduledSystem {
            id,
            type_id,
            name,
            system: Box::new(system),
            priority,
            enabled: true,
            bindings,
            last_duration: None,
            runs: 0,
        });
        self.systems.sort_by_key(|s| (s.priority, s.id));
        Ok(id)
    }

    fn bind(store: &mut EntityStore, defs: Vec<QueryDef>) -> EcsResult<Vec<QueryBinding>> {
        // Resolve everything before subscribing so a failure leaves no listeners behind
        let mut resolved = Vec::with_capacity(defs.len());
        for def in defs {
            let query = store.resolve_query(&def.terms)?;
            let filter = match &def.changed {
                None => None,
                Some(refs) if refs.is_empty() => Some(ChangeFilter::Any),
                Some(refs) => Some(ChangeFilter::Components(
                    refs.iter()
                        .map(|r| store.resolve_component(*r))
                        .collect::<EcsResult<Vec<_>>>()?,
                )),
            };
            resolved.push((def, query, filter));
        }

        let queries = store.queries_mut();
        Ok(resolved
            .into_iter()
            .map(|(def, query, filter)| QueryBinding {
                name: def.name,
                query,
                added: def.added.then(|| queries.subscribe(query, ListenerKind::Added)),
                removed: def
                    .removed
                    .then(|| queries.subscribe(query, ListenerKind::Removed)),
                changed: filter.map(|f| queries.subscribe(query, ListenerKind::Changed(f))),
                mandatory: def.mandatory,
            })
            .collect())
    }

    /// Remove a system and its listeners
    pub fn remove_system(&mut self, store: &mut EntityStore, id: SystemId) -> EcsResult<()> {
        let index = self.index_of(id)?;
        let scheduled = self.systems.remove(index);
        for binding in &scheduled.bindings {
            for listener in binding.listeners() {
                store.queries_mut().unsubscribe(listener);
            }
        }
        debug!(system = %scheduled.name, "removed system");
        Ok(())
    }

    /// Enable or disable a system; disabled systems only run on forced ticks
    pub fn set_enabled(&mut self, id: SystemId, enabled: bool) -> EcsResult<()> {
        let index = self.index_of(id)?;
        self.systems[index].enabled = enabled;
        Ok(())
    }

    /// Whether a system runs on unforced ticks
    pub fn is_enabled(&self, id: SystemId) -> Option<bool> {
        self.systems.iter().find(|s| s.id == id).map(|s| s.enabled)
    }

    /// Disable every system
    pub fn stop_all(&mut self) {
        for scheduled in &mut self.systems {
            scheduled.enabled = false;
        }
    }

    /// Enable every system
    pub fn play_all(&mut self) {
        for scheduled in &mut self.systems {
            scheduled.enabled = true;
        }
    }

    /// Id of the registered system of type `S`
    pub fn system_id<S: System>(&self) -> Option<SystemId> {
        let type_id = TypeId::of::<S>();
        self.systems.iter().find(|s| s.type_id == type_id).map(|s| s.id)
    }

    /// Get the number of registered systems
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Run one tick
    ///
    /// Disabled systems are skipped unless `force` is set. A system whose
    /// mandatory query is empty is skipped and keeps its buffered events.
    /// The first failing system aborts the tick.
    pub fn execute(
        &mut self,
        store: &mut EntityStore,
        delta: f64,
        time: f64,
        force: bool,
    ) -> EcsResult<()> {
        for scheduled in &mut self.systems {
            if !(scheduled.enabled || force) || !scheduled.can_run(store) {
                continue;
            }

            let started = Instant::now();
            let mut ctx = SystemContext::new(store, &scheduled.bindings, delta, time);
            let result = scheduled.system.run(&mut ctx);
            scheduled.last_duration = Some(started.elapsed());

            if let Err(source) = result {
                return Err(EcsError::SystemFailed {
                    system: scheduled.name.clone(),
                    source,
                });
            }

            scheduled.runs += 1;
            for binding in &scheduled.bindings {
                binding.clear(store.queries_mut());
            }
        }
        Ok(())
    }

    /// Diagnostics for every system in execution order
    pub fn stats(&self, store: &EntityStore) -> Vec<SystemStats> {
        self.systems
            .iter()
            .map(|s| SystemStats {
                id: s.id,
                name: s.name.clone(),
                enabled: s.enabled,
                priority: s.priority,
                last_duration: s.last_duration,
                runs: s.runs,
                queries: s
                    .bindings
                    .iter()
                    .map(|b| SystemQueryStats {
                        name: b.name,
                        entities: store.query_entities(b.query).len(),
                        mandatory: b.mandatory,
                    })
                    .collect(),
            })
            .collect()
    }

    fn index_of(&self, id: SystemId) -> EcsResult<usize> {
        self.systems
            .iter()
            .position(|s| s.id == id)
            .ok_or(EcsError::UnknownSystem(id))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
