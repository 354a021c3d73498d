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
//! Component types, schemas and the component registry
//!
//! Components are plain data records. How a component type is constructed,
//! reset for pooling and copied from caller-supplied initial values is
//! described by its [`ComponentSchema`]. The [`ComponentRegistry`] turns
//! schemas into dense [`ComponentId`]s and owns one pool per type.
//!
//! # Example
//!
//! ```
//! use reactive_ecs::ecs::{Component, ComponentSchema};
//!
//! #[derive(Debug, Default, Clone)]
//! struct Health {
//!     current: f32,
//!     max: f32,
//! }
//!
//! impl Component for Health {
//!     fn schema() -> ComponentSchema<Self> {
//!         ComponentSchema::pooled().cloneable()
//!     }
//! }
//! ```

use crate::ecs::entity::BoxedComponent;
use crate::error::{EcsError, EcsResult};
use crate::pool::{ComponentPool, ErasedPool, PoolConfig, PoolStats};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Trait that all components must implement
///
/// Components should be plain data structures without behavior.
pub trait Component: Any + Send + Sync + Sized {
    /// Describe how instances of this type are built, reset and copied
    fn schema() -> ComponentSchema<Self>;
}

/// Restores an instance to its default state so it can be pooled
pub trait Resettable {
    /// Reset in place
    fn reset(&mut self);
}

/// Copies the value of another instance into `self`
pub trait Copyable {
    /// Overwrite `self` with the contents of `source`
    fn copy_from(&mut self, source: &Self);
}

fn reset_to_default<T: Default>(value: &mut T) {
    *value = T::default();
}

fn clone_from_source<T: Clone>(target: &mut T, source: &T) {
    target.clone_from(source);
}

/// Construction, reset and copy capabilities of a component type
pub struct ComponentSchema<T> {
    name: &'static str,
    factory: Option<fn() -> T>,
    reset: Option<fn(&mut T)>,
    copy: Option<fn(&mut T, &T)>,
    pool: Option<PoolConfig>,
}

impl<T: Component> ComponentSchema<T> {
    /// An empty schema
    ///
    /// Registration fails until a factory is supplied with
    /// [`with_default`](Self::with_default) or [`with_factory`](Self::with_factory).
    pub fn new() -> Self {
        let full = std::any::type_name::<T>();
        ComponentSchema {
            name: full.rsplit("::").next().unwrap_or(full),
            factory: None,
            reset: None,
            copy: None,
            pool: None,
        }
    }

    /// Default-constructed, and reset to default when pooled
    pub fn pooled() -> Self
    where
        T: Default,
    {
        Self::new().with_default().reset_to_default()
    }

    /// Override the name reported in logs and diagnostics
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Build default instances with `T::default`
    pub fn with_default(self) -> Self
    where
        T: Default,
    {
        self.with_factory(T::default)
    }

    /// Build default instances with a custom constructor
    pub fn with_factory(mut self, factory: fn() -> T) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Reset pooled instances through [`Resettable`]
    pub fn resettable(mut self) -> Self
    where
        T: Resettable,
    {
        self.reset = Some(<T as Resettable>::reset);
        self
    }

    /// Reset pooled instances by assigning `T::default()`
    pub fn reset_to_default(mut self) -> Self
    where
        T: Default,
    {
        self.reset = Some(reset_to_default::<T>);
        self
    }

    /// Apply initial values through [`Copyable`]
    pub fn copyable(mut self) -> Self
    where
        T: Copyable,
    {
        self.copy = Some(<T as Copyable>::copy_from);
        self
    }

    /// Apply initial values with `Clone::clone_from`
    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.copy = Some(clone_from_source::<T>);
        self
    }

    /// Use a dedicated pool configuration for this type
    pub fn with_pool(mut self, config: PoolConfig) -> Self {
        self.pool = Some(config);
        self
    }

    /// Name reported in logs and diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Component> Default for ComponentSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense identifier assigned to a component type at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u32);

impl ComponentId {
    /// Position of the type in registration order
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component type named before it is necessarily registered
///
/// Resolving the reference registers the type lazily.
#[derive(Clone, Copy)]
pub struct ComponentRef {
    type_id: TypeId,
    name: &'static str,
    resolve: fn(&mut ComponentRegistry) -> EcsResult<ComponentId>,
}

impl ComponentRef {
    /// Reference the component type `T`
    pub fn of<T: Component>() -> Self {
        ComponentRef {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            resolve: ComponentRegistry::ensure::<T>,
        }
    }

    /// Rust type id of the referenced type
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the referenced type
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn resolve(&self, registry: &mut ComponentRegistry) -> EcsResult<ComponentId> {
        (self.resolve)(registry)
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name).finish()
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentRef {}

struct Hooks<T> {
    factory: fn() -> T,
    reset: Option<fn(&mut T)>,
    copy: Option<fn(&mut T, &T)>,
}

struct ComponentEntry {
    name: &'static str,
    pool: Box<dyn ErasedPool>,
    hooks: Box<dyn Any + Send + Sync>,
}

/// Pool diagnostics for one component type
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentPoolStats {
    /// Component id
    pub id: ComponentId,
    /// Component name
    pub name: &'static str,
    /// Whether released instances are recycled
    pub pooling: bool,
    /// Pool counters
    pub stats: PoolStats,
}

/// Maps component types to ids, schemas and pools
pub struct ComponentRegistry {
    ids: HashMap<TypeId, ComponentId>,
    entries: Vec<ComponentEntry>,
    default_pool: PoolConfig,
}

impl ComponentRegistry {
    /// Create an empty registry whose pools use `default_pool` unless a
    /// schema overrides it
    pub fn new(default_pool: PoolConfig) -> Self {
        ComponentRegistry {
            ids: HashMap::new(),
            entries: Vec::new(),
            default_pool,
        }
    }

    /// Register `T` with its own schema
    ///
    /// Registering a type twice is a no-op that logs a warning.
    pub fn register<T: Component>(&mut self) -> EcsResult<ComponentId> {
        self.register_with(T::schema())
    }

    /// Register `T` with an explicit schema
    pub fn register_with<T: Component>(
        &mut self,
        schema: ComponentSchema<T>,
    ) -> EcsResult<ComponentId> {
        if let Some(&id) = self.ids.get(&TypeId::of::<T>()) {
            warn!(component = schema.name, "component type already registered");
            return Ok(id);
        }
        self.insert(schema)
    }

    /// Id of `T`, registering it silently on first use
    pub(crate) fn ensure<T: Component>(&mut self) -> EcsResult<ComponentId> {
        match self.ids.get(&TypeId::of::<T>()) {
            Some(&id) => Ok(id),
            None => self.insert(T::schema()),
        }
    }

    fn insert<T: Component>(&mut self, schema: ComponentSchema<T>) -> EcsResult<ComponentId> {
        let factory = schema.factory.ok_or(EcsError::MissingDefault {
            component: schema.name,
        })?;
        let config = schema.pool.unwrap_or_else(|| self.default_pool.clone());
        let pool = ComponentPool::new(schema.name, factory, schema.reset, config);

        let id = ComponentId(self.entries.len() as u32);
        self.entries.push(ComponentEntry {
            name: schema.name,
            pool: Box::new(pool),
            hooks: Box::new(Hooks {
                factory,
                reset: schema.reset,
                copy: schema.copy,
            }),
        });
        self.ids.insert(TypeId::of::<T>(), id);

        debug!(component = schema.name, id = id.0, "registered component type");
        Ok(id)
    }

    /// Id of `T` if registered
    pub fn id_of<T: Component>(&self) -> Option<ComponentId> {
        self.ids.get(&TypeId::of::<T>()).copied()
    }

    /// Id of the type behind `type_id` if registered
    pub fn id_of_type(&self, type_id: TypeId) -> Option<ComponentId> {
        self.ids.get(&type_id).copied()
    }

    /// Whether `T` is registered
    pub fn is_registered<T: Component>(&self) -> bool {
        self.ids.contains_key(&TypeId::of::<T>())
    }

    /// Name of a registered component
    pub fn name(&self, id: ComponentId) -> Option<&'static str> {
        self.entries.get(id.index()).map(|e| e.name)
    }

    /// Number of registered component types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no component type is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take a defaulted instance of `T` from its pool
    pub fn acquire<T: Component>(&mut self, id: ComponentId) -> EcsResult<Box<T>> {
        let entry = self.entry_mut(id)?;
        let name = entry.name;
        entry
            .pool
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
            .map(ComponentPool::<T>::acquire)
            .ok_or(EcsError::UnknownComponent { component: name })
    }

    /// Return an instance to the pool of component `id`
    pub(crate) fn release(&mut self, id: ComponentId, instance: BoxedComponent) {
        match self.entries.get_mut(id.index()) {
            Some(entry) => entry.pool.release_erased(instance),
            None => warn!(id = id.0, "released an instance of an unregistered component"),
        }
    }

    /// Overwrite `target` with `source` using the type's copy capability,
    /// moving `source` in when the type has none
    pub(crate) fn apply_initial<T: Component>(&self, id: ComponentId, target: &mut T, source: T) {
        match self.hooks::<T>(id).and_then(|h| h.copy) {
            Some(copy) => copy(target, &source),
            None => *target = source,
        }
    }

    /// Put an attached instance back into its default state
    pub(crate) fn reinitialize<T: Component>(&self, id: ComponentId, target: &mut T) {
        if let Some(hooks) = self.hooks::<T>(id) {
            match hooks.reset {
                Some(reset) => reset(target),
                None => *target = (hooks.factory)(),
            }
        }
    }

    /// Pool counters for component `id`
    pub fn pool_stats(&self, id: ComponentId) -> Option<PoolStats> {
        self.entries.get(id.index()).map(|e| e.pool.stats())
    }

    /// Pool diagnostics for every registered type, in registration order
    pub fn stats(&self) -> Vec<ComponentPoolStats> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ComponentPoolStats {
                id: ComponentId(index as u32),
                name: entry.name,
                pooling: entry.pool.is_pooling(),
                stats: entry.pool.stats(),
            })
            .collect()
    }

    fn entry_mut(&mut self, id: ComponentId) -> EcsResult<&mut ComponentEntry> {
        self.entries
            .get_mut(id.index())
            .ok_or(EcsError::UnknownComponent { component: "<unregistered>" })
    }

    fn hooks<T: Component>(&self, id: ComponentId) -> Option<&Hooks<T>> {
        self.entries
            .get(id.index())
            .and_then(|e| e.hooks.downcast_ref::<Hooks<T>>())
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
