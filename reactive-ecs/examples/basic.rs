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
//! Basic example demonstrating the reactive ECS
//!
//! Spawns particles with a limited lifetime, moves them every tick, reacts
//! to the ones that expire and reports pool statistics at the end.
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to see registration
//! and pool growth logs.

use reactive_ecs::ecs::{
    Component, ComponentSchema, QueryDef, System, SystemContext, World, WorldConfig,
};
use reactive_ecs::error::SystemResult;
use reactive_ecs::pool::PoolConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Clone)]
struct Position {
    x: f64,
    y: f64,
}

impl Component for Position {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

#[derive(Debug, Default, Clone)]
struct Velocity {
    dx: f64,
    dy: f64,
}

impl Component for Velocity {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

#[derive(Debug, Default, Clone)]
struct Lifetime {
    remaining: f64,
}

impl Component for Lifetime {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

/// Spawns a handful of particles every tick
struct Emitter {
    spawned: u32,
}

impl System for Emitter {
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let store = ctx.store_mut();
        for _ in 0..4 {
            let angle = self.spawned as f64 * 0.7;
            let e = store.create_entity();
            store
                .add_component(e, Some(Position { x: 0.0, y: 0.0 }))?
                .add_component(e, Some(Velocity { dx: angle.cos(), dy: angle.sin() }))?
                .add_component(e, Some(Lifetime { remaining: 0.1 + (self.spawned % 5) as f64 * 0.05 }))?;
            self.spawned += 1;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Emitter"
    }
}

/// Applies velocity to position
struct Movement;

impl System for Movement {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("moving").with::<Position>().with::<Velocity>()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let delta = ctx.delta();
        for entity in ctx.snapshot("moving") {
            let Some(v) = ctx.store().get_component::<Velocity>(entity).cloned() else {
                continue;
            };
            if let Some(p) = ctx.store_mut().get_mutable_component::<Position>(entity) {
                p.x += v.dx * delta;
                p.y += v.dy * delta;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Movement"
    }
}

/// Ages particles and removes the expired ones
struct Aging;

impl System for Aging {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("mortal").with::<Lifetime>().mandatory()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let delta = ctx.delta();
        for entity in ctx.snapshot("mortal") {
            let store = ctx.store_mut();
            let expired = store
                .get_mutable_component::<Lifetime>(entity)
                .map(|life| {
                    life.remaining -= delta;
                    life.remaining <= 0.0
                })
                .unwrap_or(false);
            if expired {
                store.remove_entity(entity, false)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Aging"
    }
}

/// Reports where expired particles ended up
struct Obituary {
    reported: usize,
}

impl System for Obituary {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("particles").with::<Position>().listen_removed()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        for &entity in ctx.removed("particles") {
            // Deferred removal keeps the data readable until the flush
            if let Some(p) = ctx.store().get_removed_component::<Position>(entity) {
                if self.reported < 3 {
                    println!("  {} expired at ({:.3}, {:.3})", entity, p.x, p.y);
                }
                self.reported += 1;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "Obituary"
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("Reactive ECS - Basic Example");
    println!("============================\n");

    let config = WorldConfig::default()
        .with_entity_pool_size(64)
        .with_component_pool(PoolConfig::default().with_initial_capacity(32).with_logging())
        .with_flush_after_execute();
    let mut world = World::with_config(config);

    world.register_system_with_priority(Emitter { spawned: 0 }, -10)?;
    world.register_system(Movement)?;
    world.register_system_with_priority(Aging, 10)?;
    world.register_system_with_priority(Obituary { reported: 0 }, 20)?;

    let delta = 1.0 / 60.0;
    for frame in 0..120 {
        world.execute(delta, frame as f64 * delta)?;
    }

    let stats = world.stats();
    println!();
    info!(entities = stats.entities, queries = stats.queries.len(), "simulation finished");

    println!("Entity pool: {:?}", stats.entity_pool);
    for pool in &stats.pools {
        println!(
            "  {:<10} pooling={} used={} total={} hit rate={:.1}%",
            pool.name,
            pool.pooling,
            pool.stats.used,
            pool.stats.total,
            pool.stats.hit_rate()
        );
    }
    for system in &stats.systems {
        println!(
            "  {:<10} priority={:>3} runs={} last={:?}",
            system.name, system.priority, system.runs, system.last_duration
        );
    }

    Ok(())
}
