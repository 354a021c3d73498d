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
//! System definitions
//!
//! Systems contain the logic that operates on entities and components. A
//! system declares named queries up front; the scheduler resolves them into
//! shared queries, subscribes the requested listeners and hands the system a
//! [`SystemContext`] on every run.

use crate::ecs::component::{Component, ComponentRef};
use crate::ecs::entity::Entity;
use crate::ecs::query::{ListenerId, QueryId, QueryIndex, Term};
use crate::ecs::store::EntityStore;
use crate::error::SystemResult;

/// Trait for systems driven by the [`Scheduler`](crate::ecs::Scheduler)
///
/// # Examples
///
/// ```
/// use reactive_ecs::ecs::{Component, ComponentSchema, QueryDef, System, SystemContext};
/// use reactive_ecs::error::SystemResult;
///
/// #[derive(Debug, Default, Clone)]
/// struct Velocity(f64);
///
/// impl Component for Velocity {
///     fn schema() -> ComponentSchema<Self> {
///         ComponentSchema::pooled().cloneable()
///     }
/// }
///
/// struct Damping;
///
/// impl System for Damping {
///     fn queries(&self) -> Vec<QueryDef> {
///         vec![QueryDef::new("moving").with::<Velocity>()]
///     }
///
///     fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult {
///         for entity in ctx.snapshot("moving") {
///             if let Some(v) = ctx.store_mut().get_mutable_component::<Velocity>(entity) {
///                 v.0 *= 0.9;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait System: Send + Sync + 'static {
    /// Queries this system reads, resolved once at registration
    fn queries(&self) -> Vec<QueryDef> {
        Vec::new()
    }

    /// One-time hook run after the queries are resolved
    fn init(&mut self, _store: &mut EntityStore) -> SystemResult {
        Ok(())
    }

    /// Execute one tick
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> SystemResult;

    /// Get the name of this system for debugging
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A named query declaration
#[derive(Debug, Clone)]
pub struct QueryDef {
    pub(crate) name: &'static str,
    pub(crate) terms: Vec<Term>,
    pub(crate) added: bool,
    pub(crate) removed: bool,
    /// `Some(empty)` listens to every included component
    pub(crate) changed: Option<Vec<ComponentRef>>,
    pub(crate) mandatory: bool,
}

impl QueryDef {
    /// Start a declaration; the name is how the system reads it back
    pub fn new(name: &'static str) -> Self {
        QueryDef {
            name,
            terms: Vec::new(),
            added: false,
            removed: false,
            changed: None,
            mandatory: false,
        }
    }

    /// Require component `T`
    pub fn with<T: Component>(self) -> Self {
        self.term(Term::with::<T>())
    }

    /// Exclude entities holding component `T`
    pub fn without<T: Component>(self) -> Self {
        self.term(Term::not::<T>())
    }

    /// Append an arbitrary term
    pub fn term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    /// Buffer entities that start matching
    pub fn listen_added(mut self) -> Self {
        self.added = true;
        self
    }

    /// Buffer entities that stop matching
    pub fn listen_removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// Buffer members whose included components are mutated
    pub fn listen_changed(mut self) -> Self {
        self.changed = Some(Vec::new());
        self
    }

    /// Buffer members whose component `T` is mutated
    ///
    /// May be repeated to watch several types.
    pub fn listen_changed_of<T: Component>(mut self) -> Self {
        self.changed
            .get_or_insert_with(Vec::new)
            .push(ComponentRef::of::<T>());
        self
    }

    /// Skip the system entirely while this query is empty
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Name the system uses to read this query back
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared terms
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }
}

/// A resolved [`QueryDef`]
#[derive(Debug, Clone)]
pub(crate) struct QueryBinding {
    pub name: &'static str,
    pub query: QueryId,
    pub added: Option<ListenerId>,
    pub removed: Option<ListenerId>,
    pub changed: Option<ListenerId>,
    pub mandatory: bool,
}

impl QueryBinding {
    pub fn listeners(&self) -> impl Iterator<Item = ListenerId> {
        [self.added, self.removed, self.changed].into_iter().flatten()
    }

    pub fn clear(&self, queries: &mut QueryIndex) {
        for listener in self.listeners() {
            queries.clear(listener);
        }
    }
}

/// What a system sees while it runs
///
/// Query results are borrowed from the store, so the borrow checker rejects
/// mutating the store while iterating [`results`](Self::results). Iterate a
/// [`snapshot`](Self::snapshot) instead when the loop body mutates.
pub struct SystemContext<'a> {
    store: &'a mut EntityStore,
    bindings: &'a [QueryBinding],
    delta: f64,
    time: f64,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        store: &'a mut EntityStore,
        bindings: &'a [QueryBinding],
        delta: f64,
        time: f64,
    ) -> Self {
        SystemContext {
            store,
            bindings,
            delta,
            time,
        }
    }

    /// Seconds since the previous tick
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Elapsed time supplied by the caller
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Read access to the store
    pub fn store(&self) -> &EntityStore {
        &*self.store
    }

    /// Write access to the store
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut *self.store
    }

    /// Id of the shared query bound to `name`
    pub fn query(&self, name: &str) -> Option<QueryId> {
        self.binding(name).map(|b| b.query)
    }

    /// Entities currently matching the query `name`
    ///
    /// Unknown names yield an empty slice.
    pub fn results(&self, name: &str) -> &[Entity] {
        match self.binding(name) {
            Some(binding) => self.store.query_entities(binding.query),
            None => &[],
        }
    }

    /// Owned copy of [`results`](Self::results), safe to iterate while mutating
    pub fn snapshot(&self, name: &str) -> Vec<Entity> {
        self.results(name).to_vec()
    }

    /// Entities that started matching `name` since this system last ran
    pub fn added(&self, name: &str) -> &[Entity] {
        self.events(name, |b| b.added)
    }

    /// Entities that stopped matching `name` since this system last ran
    pub fn removed(&self, name: &str) -> &[Entity] {
        self.events(name, |b| b.removed)
    }

    /// Members of `name` mutated since this system last ran
    pub fn changed(&self, name: &str) -> &[Entity] {
        self.events(name, |b| b.changed)
    }

    fn binding(&self, name: &str) -> Option<&QueryBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    fn events(&self, name: &str, pick: impl Fn(&QueryBinding) -> Option<ListenerId>) -> &[Entity] {
        match self.binding(name).and_then(pick) {
            Some(listener) => self.store.queries().events(listener),
            None => &[],
        }
    }
}
