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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Entity management with generational handles and slot pooling
//! - Component registration, pooling and two-phase removal
//! - Shared, incrementally maintained queries with event listeners
//! - Priority-ordered system execution

mod component;
mod entity;
mod query;
mod scheduler;
mod store;
mod system;
mod world;

pub use component::{
    Component, ComponentId, ComponentPoolStats, ComponentRef, ComponentRegistry, ComponentSchema,
    Copyable, Resettable,
};
pub use entity::{Entity, EntityId, EntityState};
#[cfg(feature = "parallel")]
pub use query::PARALLEL_BACKFILL_THRESHOLD;
pub use query::{ChangeFilter, ListenerId, ListenerKind, Query, QueryId, QueryIndex, QueryKey, QueryStats, Term};
pub use scheduler::{Scheduler, SystemId, SystemQueryStats, SystemStats};
pub use store::{EntityStore, FlushSummary};
pub use system::{QueryDef, System, SystemContext};
pub use world::{World, WorldConfig, WorldStats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_creation() {
        let world = World::new();
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_entity_creation() {
        let mut world = World::new();
        let entity = world.create_entity();
        assert_eq!(world.entity_count(), 1);
        assert!(world.is_alive(entity));
    }
}
