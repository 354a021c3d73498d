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
//! Listener buffers as seen by systems across ticks

use reactive_ecs::ecs::{
    Component, ComponentSchema, Entity, QueryDef, System, SystemContext, World,
};
use reactive_ecs::error::SystemResult;
use reactive_ecs::EcsError;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, Clone, PartialEq)]
struct Health(i32);

impl Component for Health {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Armor(i32);

impl Component for Armor {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled().cloneable()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Poisoned;

impl Component for Poisoned {
    fn schema() -> ComponentSchema<Self> {
        ComponentSchema::pooled()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Frame {
    added: Vec<Entity>,
    removed: Vec<Entity>,
    changed: Vec<Entity>,
}

type Frames = Arc<Mutex<Vec<Frame>>>;

/// Records what its listeners buffered on every run
struct Observer {
    frames: Frames,
}

impl System for Observer {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("living")
            .with::<Health>()
            .listen_added()
            .listen_removed()
            .listen_changed()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        self.frames.lock().unwrap().push(Frame {
            added: ctx.added("living").to_vec(),
            removed: ctx.removed("living").to_vec(),
            changed: ctx.changed("living").to_vec(),
        });
        Ok(())
    }
}

/// Only reacts to armor mutations on armored, living entities
struct ArmorWatcher {
    frames: Frames,
}

impl System for ArmorWatcher {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("armored")
            .with::<Health>()
            .with::<Armor>()
            .listen_changed_of::<Armor>()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        self.frames.lock().unwrap().push(Frame {
            changed: ctx.changed("armored").to_vec(),
            ..Frame::default()
        });
        Ok(())
    }
}

/// Poison ticks health down and mutates through the store
struct PoisonDamage;

impl System for PoisonDamage {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("poisoned").with::<Health>().with::<Poisoned>()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        for entity in ctx.snapshot("poisoned") {
            let store = ctx.store_mut();
            if let Some(health) = store.get_mutable_component::<Health>(entity) {
                health.0 -= 1;
            }
            store.remove_component::<Poisoned>(entity, false)?;
        }
        Ok(())
    }
}

fn frames() -> Frames {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_each_run_sees_events_since_previous_run() {
    let mut world = World::new();
    let log = frames();
    world.register_system(Observer { frames: Arc::clone(&log) }).unwrap();

    let a = world.create_entity();
    let b = world.create_entity();
    world.add_component(a, Some(Health(10))).unwrap();
    world.add_component(b, Some(Health(10))).unwrap();
    world.execute(0.016, 0.016).unwrap();

    world.get_mutable_component::<Health>(a).unwrap().0 = 5;
    world.get_mutable_component::<Health>(a).unwrap().0 = 4;
    world.remove_entity(b, false).unwrap();
    world.execute(0.016, 0.032).unwrap();

    world.execute(0.016, 0.048).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0].added, vec![a, b]);
    assert!(log[0].removed.is_empty());
    assert_eq!(log[1], Frame { added: vec![], removed: vec![b], changed: vec![a] });
    assert_eq!(log[2], Frame::default());
}

#[test]
fn test_changed_filter_restricts_component() {
    let mut world = World::new();
    let log = frames();
    world.register_system(ArmorWatcher { frames: Arc::clone(&log) }).unwrap();

    let e = world.create_entity();
    world
        .add_component(e, Some(Health(3)))
        .unwrap()
        .add_component(e, Some(Armor(1)))
        .unwrap();

    world.get_mutable_component::<Health>(e).unwrap().0 = 2;
    world.execute(0.016, 0.0).unwrap();
    world.get_mutable_component::<Armor>(e).unwrap().0 = 9;
    world.execute(0.016, 0.0).unwrap();

    let log = log.lock().unwrap();
    assert!(log[0].changed.is_empty());
    assert_eq!(log[1].changed, vec![e]);
}

#[test]
fn test_reattach_is_reported_as_change() {
    let mut world = World::new();
    let log = frames();
    world.register_system(Observer { frames: Arc::clone(&log) }).unwrap();

    let e = world.create_entity();
    world.add_component(e, Some(Health(7))).unwrap();
    world.execute(0.016, 0.0).unwrap();

    world.add_component(e, Some(Health(8))).unwrap();
    world.execute(0.016, 0.0).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log[1], Frame { added: vec![], removed: vec![], changed: vec![e] });
    assert_eq!(world.get_component::<Health>(e), Some(&Health(8)));
}

#[test]
fn test_earlier_system_mutations_reach_later_listeners() {
    let mut world = World::new();
    let log = frames();
    world.register_system_with_priority(PoisonDamage, 0).unwrap();
    world
        .register_system_with_priority(Observer { frames: Arc::clone(&log) }, 1)
        .unwrap();

    let e = world.create_entity();
    world
        .add_component(e, Some(Health(5)))
        .unwrap()
        .add_component::<Poisoned>(e, None)
        .unwrap();

    world.execute(0.016, 0.0).unwrap();
    assert_eq!(world.get_component::<Health>(e), Some(&Health(4)));
    assert!(world.has_removed_component::<Poisoned>(e));

    let log = log.lock().unwrap();
    assert_eq!(log[0].added, vec![e]);
    assert_eq!(log[0].changed, vec![e]);
}

#[test]
fn test_listeners_are_independent_per_system() {
    let mut world = World::new();
    let first = frames();
    let second = frames();
    world.register_system(Observer { frames: Arc::clone(&first) }).unwrap();
    world.register_system(ArmorWatcher { frames: Arc::clone(&second) }).unwrap();

    let e = world.create_entity();
    world
        .add_component(e, Some(Health(1)))
        .unwrap()
        .add_component(e, Some(Armor(1)))
        .unwrap();
    world.get_mutable_component::<Armor>(e).unwrap().0 = 2;

    let observer = world.system_id::<Observer>().unwrap();
    world.set_system_enabled(observer, false).unwrap();
    world.execute(0.016, 0.0).unwrap();
    world.set_system_enabled(observer, true).unwrap();
    world.execute(0.016, 0.0).unwrap();

    // The observer's query never includes Armor, so only its added event survives
    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(first.lock().unwrap()[0].added, vec![e]);
    assert!(first.lock().unwrap()[0].changed.is_empty());

    let second = second.lock().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].changed, vec![e]);
    assert!(second[1].changed.is_empty());
}

struct Exploding;

impl System for Exploding {
    fn queries(&self) -> Vec<QueryDef> {
        vec![QueryDef::new("living").with::<Health>().listen_added()]
    }

    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
        if ctx.results("living").len() > 1 {
            return Err(format!("{} entities is too many", ctx.results("living").len()).into());
        }
        Ok(())
    }
}

#[test]
fn test_system_error_surfaces_from_execute() {
    let mut world = World::new();
    world.register_system(Exploding).unwrap();

    for _ in 0..2 {
        let e = world.create_entity();
        world.add_component::<Health>(e, None).unwrap();
    }

    match world.execute(0.016, 0.0) {
        Err(EcsError::SystemFailed { system, source }) => {
            assert!(system.ends_with("Exploding"));
            assert_eq!(source.to_string(), "2 entities is too many");
        }
        other => panic!("expected a system failure, got {other:?}"),
    }
}
