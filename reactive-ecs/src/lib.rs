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
//! # Reactive ECS
//!
//! An in-process entity component store with incrementally maintained
//! queries, aimed at simulations where a large, churning set of entities is
//! iterated by independent systems every tick.
//!
//! ## Features
//!
//! - **Pooling**: entity slots and component instances are recycled
//! - **Shared queries**: one membership list per signature, updated on every attach and detach
//! - **Reactive listeners**: added, removed and changed events buffered per system
//! - **Two-phase removal**: removed data stays readable until an explicit flush
//! - **Parallelization**: optional Rayon back-fill when a query is created over many entities
//!
//! ## Example
//!
//! ```rust
//! use reactive_ecs::ecs::{Component, ComponentSchema, QueryDef, System, SystemContext, World};
//! use reactive_ecs::error::SystemResult;
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Position(f64);
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Velocity(f64);
//!
//! impl Component for Position {
//!     fn schema() -> ComponentSchema<Self> {
//!         ComponentSchema::pooled().cloneable()
//!     }
//! }
//!
//! impl Component for Velocity {
//!     fn schema() -> ComponentSchema<Self> {
//!         ComponentSchema::pooled().cloneable()
//!     }
//! }
//!
//! struct Movement;
//!
//! impl System for Movement {
//!     fn queries(&self) -> Vec<QueryDef> {
//!         vec![QueryDef::new("moving").with::<Position>().with::<Velocity>()]
//!     }
//!
//!     fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
//!         let delta = ctx.delta();
//!         for entity in ctx.snapshot("moving") {
//!             let v = ctx.store().get_component::<Velocity>(entity).map_or(0.0, |v| v.0);
//!             if let Some(p) = ctx.store_mut().get_mutable_component::<Position>(entity) {
//!                 p.0 += v * delta;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.register_system(Movement).unwrap();
//!
//! let entity = world.create_entity();
//! world
//!     .add_component(entity, Some(Position(0.0))).unwrap()
//!     .add_component(entity, Some(Velocity(2.0))).unwrap();
//!
//! world.execute(0.5, 0.5).unwrap();
//! assert_eq!(world.get_component::<Position>(entity), Some(&Position(1.0)));
//! ```

#![warn(missing_docs)]

/// Entity Component System implementation
pub mod ecs;

/// Error types
pub mod error;

/// Memory pooling for reducing allocation churn
pub mod pool;

pub use ecs::{Entity, World};
pub use error::{EcsError, EcsResult};
