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
//! Error types
//!
//! Configuration errors surface at registration time and are never retried.
//! Recoverable usage problems (duplicate registration, a component type that
//! cannot be pooled) are logged instead and never reach this type.

use crate::ecs::{Entity, SystemId};

/// Error type returned by the fallible store, scheduler and world operations
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The component schema has no way to build a default instance
    #[error("component `{component}` has no default constructor")]
    MissingDefault {
        /// Name of the offending component type
        component: &'static str,
    },

    /// The component id does not belong to the requested type
    #[error("component `{component}` is not registered for this type")]
    UnknownComponent {
        /// Name of the component involved
        component: &'static str,
    },

    /// A query was declared without any component terms
    #[error("query `{query}` declares no components")]
    EmptyQuery {
        /// Name of the query, or its owner when declared anonymously
        query: String,
    },

    /// The entity handle is stale or the entity has been removed
    #[error("{0} is not alive")]
    DeadEntity(Entity),

    /// No registered system carries this id
    #[error("unknown system {0:?}")]
    UnknownSystem(SystemId),

    /// A system returned an error from `init` or `run`
    #[error("system `{system}` failed: {source}")]
    SystemFailed {
        /// Name of the failing system
        system: String,
        /// Error returned by the system
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result alias used across the crate
pub type EcsResult<T> = Result<T, EcsError>;

/// Result returned by system hooks
pub type SystemResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
