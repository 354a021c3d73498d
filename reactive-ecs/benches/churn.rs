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
//! Benchmarks for query maintenance under entity churn
//!
//! Measures attach/detach cost with several live queries, query creation
//! over a populated store, and a full tick with reactive listeners.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reactive_ecs::ecs::{
    Component, ComponentSchema, EntityStore, QueryDef, System, SystemContext, Term, World,
};
use reactive_ecs::error::SystemResult;

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
    x: f64,
    y: f64,
}

impl Component for Velocity {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

#[derive(Debug, Default, Clone)]
struct Sleeping;

impl Component for Sleeping {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled()
    }
}

struct Integrate;

impl System for Integrate {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("moving")
            .with::<Position>()
            .with::<Velocity>()
            .without::<Sleeping>()
            .listen_changed_of::<Velocity>()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        let delta = ctx.delta();
        for entity in ctx.snapshot("moving") {
            let (vx, vy) = match ctx.store().get_component::<Velocity>(entity) {
                Some(v) => (v.x, v.y),
                None => continue,
            };
            if let Some(p) = ctx.store_mut().get_mutable_component::<Position>(entity) {
                p.x += vx * delta;
                p.y += vy * delta;
            }
        }
        Ok(())
    }
}

fn populated_store(n: usize) -> EntityStore {
    let mut store = EntityStore::new();
    store.resolve_query(&[Term::with::<Position>()]).unwrap();
    store
        .resolve_query(&[Term::with::<Position>(), Term::with::<Velocity>()])
        .unwrap();
    store
        .resolve_query(&[Term::with::<Velocity>(), Term::not::<Sleeping>()])
        .unwrap();

    for i in 0..n {
        let e = store.create_entity();
        store
            .add_component(e, Some(Position { x: i as f64, y: 0.0 }))
            .unwrap();
        if i % 2 == 0 {
            store.add_component(e, Some(Velocity { x: 1.0, y: 0.5 })).unwrap();
        }
    }
    store
}

fn bench_attach_detach(c: &mut Criterion) {
    let mut group = c.benchmark_group("attach_detach");

    for n in [100, 1_000, 10_000].iter() {
        let mut store = populated_store(*n);
        let targets: Vec<_> = store.entities().step_by(7).collect();

        group.bench_with_input(BenchmarkId::new("toggle_sleeping", n), n, |b, _| {
            b.iter(|| {
                for &e in &targets {
                    store.add_component::<Sleeping>(e, None).unwrap();
                }
                for &e in &targets {
                    store.remove_component::<Sleeping>(e, true).unwrap();
                }
                black_box(store.entity_count());
            });
        });
    }

    group.finish();
}

fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for deferred in [false, true] {
        let label = if deferred { "deferred" } else { "immediate" };
        let mut store = populated_store(1_000);

        group.bench_function(label, |b| {
            b.iter(|| {
                let spawned: Vec<_> = (0..256)
                    .map(|_| {
                        let e = store.create_entity();
                        store.add_component::<Position>(e, None).unwrap();
                        store.add_component::<Velocity>(e, None).unwrap();
                        e
                    })
                    .collect();
                for e in spawned {
                    store.remove_entity(e, !deferred).unwrap();
                }
                black_box(store.process_deferred_removal());
            });
        });
    }

    group.finish();
}

fn bench_mass_detach(c: &mut Criterion) {
    let mut group = c.benchmark_group("mass_detach");

    for n in [10_000, 40_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || {
                    let store = populated_store(n);
                    let targets: Vec<_> = store.entities().collect();
                    (store, targets)
                },
                |(mut store, targets)| {
                    for &e in targets.iter().rev() {
                        store.remove_component::<Position>(e, true).unwrap();
                    }
                    black_box(store.entity_count())
                },
            );
        });
    }

    group.finish();
}

fn bench_query_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_backfill");

    for n in [1_000, 10_000, 50_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || populated_store(n),
                |mut store| {
                    let q = store
                        .resolve_query(&[Term::with::<Position>(), Term::not::<Velocity>()])
                        .unwrap();
                    black_box(store.query_entities(q).len())
                },
            );
        });
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for n in [1_000, 10_000].iter() {
        let mut world = World::new();
        world.register_system(Integrate).unwrap();
        for i in 0..*n {
            let e = world.create_entity();
            world.add_component(e, Some(Position { x: i as f64, y: 0.0 })).unwrap();
            world.add_component(e, Some(Velocity { x: 1.0, y: 1.0 })).unwrap();
        }

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| world.execute(black_box(1.0 / 60.0), 0.0).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_attach_detach,
    bench_entity_churn,
    bench_mass_detach,
    bench_query_creation,
    bench_tick
);
criterion_main!(benches);
