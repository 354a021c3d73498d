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
//! Memory pooling for reducing allocation churn
//!
//! Component instances are recycled through per-type pools so that a
//! simulation which constantly attaches and detaches components settles into
//! a steady state without touching the allocator. A pool can only recycle
//! instances it knows how to reset; types without a reset capability fall
//! back to a dummy allocator that constructs on every acquire and only keeps
//! counts.

use std::any::Any;
use tracing::{debug, warn};

/// Configuration for pool behavior
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of instances constructed up front
    pub initial_capacity: usize,
    /// Maximum number of free instances to keep; extra releases are dropped
    pub max_pool_size: usize,
    /// Growth factor applied to the pool size when the free list runs dry
    /// (e.g., 1.2 grows the pool by 20%, plus one instance)
    pub growth_factor: f64,
    /// Whether to log when the pool grows
    pub log_resize_events: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_capacity: 0,
            max_pool_size: usize::MAX,
            growth_factor: 1.2,
            log_resize_events: false,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with custom settings
    pub fn new(initial_capacity: usize, max_pool_size: usize) -> Self {
        PoolConfig {
            initial_capacity,
            max_pool_size,
            ..PoolConfig::default()
        }
    }

    /// Enable logging for resize events
    pub fn with_logging(mut self) -> Self {
        self.log_resize_events = true;
        self
    }

    /// Set the growth factor used when the free list is exhausted
    pub fn with_growth_factor(mut self, factor: f64) -> Self {
        assert!(factor >= 1.0, "Growth factor must be >= 1.0");
        self.growth_factor = factor;
        self
    }

    /// Set the number of instances constructed up front
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }
}

/// Statistics for monitoring pool performance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Instances owned by the pool or handed out and not yet dropped
    pub total: usize,
    /// Instances sitting in the free list
    pub free: usize,
    /// Instances currently handed out
    pub used: usize,
    /// Number of acquisitions served from the free list
    pub hits: usize,
    /// Number of acquisitions that had to construct
    pub misses: usize,
    /// Number of times the pool grew
    pub resize_count: usize,
    /// Peak number of instances handed out at once
    pub peak_used: usize,
}

impl PoolStats {
    /// Calculate the hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// A free-list pool of boxed instances of one type
///
/// Instances come back from [`release`](Self::release) already reset, so
/// [`acquire`](Self::acquire) always returns something indistinguishable
/// from a freshly constructed default.
pub struct ComponentPool<T> {
    name: &'static str,
    free: Vec<Box<T>>,
    factory: fn() -> T,
    reset: Option<fn(&mut T)>,
    config: PoolConfig,
    stats: PoolStats,
}

impl<T> ComponentPool<T> {
    /// Create a pool for `name`
    ///
    /// Without a `reset` function the pool degrades to a dummy allocator;
    /// this is logged once and is not an error.
    pub fn new(
        name: &'static str,
        factory: fn() -> T,
        reset: Option<fn(&mut T)>,
        config: PoolConfig,
    ) -> Self {
        let initial = config.initial_capacity;
        let mut pool = ComponentPool {
            name,
            free: Vec::new(),
            factory,
            reset,
            config,
            stats: PoolStats::default(),
        };

        if pool.reset.is_none() {
            warn!(
                component = name,
                "component has no reset capability; instances will not be pooled"
            );
        } else if initial > 0 {
            pool.expand(initial);
        }

        pool
    }

    /// Whether released instances are recycled
    pub fn is_pooling(&self) -> bool {
        self.reset.is_some()
    }

    /// Name of the pooled type
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Take an instance out of the pool, growing it when the free list is empty
    pub fn acquire(&mut self) -> Box<T> {
        let hit = !self.free.is_empty();
        if !hit && self.is_pooling() {
            self.expand(self.growth_amount());
        }

        let instance = match self.free.pop() {
            Some(instance) => instance,
            None => {
                // Dummy allocator path
                self.stats.total += 1;
                Box::new((self.factory)())
            }
        };

        if hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        self.stats.used += 1;
        if self.stats.used > self.stats.peak_used {
            self.stats.peak_used = self.stats.used;
        }

        instance
    }

    /// Reset an instance and hand it back to the free list
    pub fn release(&mut self, mut instance: Box<T>) {
        self.stats.used = self.stats.used.saturating_sub(1);

        match self.reset {
            Some(reset) if self.free.len() < self.config.max_pool_size => {
                reset(&mut instance);
                self.free.push(instance);
            }
            // Either not poolable or the free list is full: drop it
            _ => self.stats.total = self.stats.total.saturating_sub(1),
        }
    }

    /// Construct `count` instances into the free list
    pub fn expand(&mut self, count: usize) {
        if count == 0 || !self.is_pooling() {
            return;
        }

        self.free.reserve(count);
        for _ in 0..count {
            self.free.push(Box::new((self.factory)()));
        }
        self.stats.total += count;
        self.stats.resize_count += 1;

        if self.config.log_resize_events {
            debug!(
                component = self.name,
                added = count,
                total = self.stats.total,
                hit_rate = self.stats.hit_rate(),
                "component pool grew"
            );
        }
    }

    /// Drop every free instance
    pub fn clear(&mut self) {
        self.stats.total -= self.free.len();
        self.free.clear();
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            free: self.free.len(),
            ..self.stats.clone()
        }
    }

    fn growth_amount(&self) -> usize {
        let grown = self.stats.total as f64 * (self.config.growth_factor - 1.0);
        grown.round() as usize + 1
    }
}

/// Type-erased view of a [`ComponentPool`], used by the component registry
pub(crate) trait ErasedPool: Send + Sync {
    /// Release an instance whose concrete type is the pool's type
    fn release_erased(&mut self, instance: Box<dyn Any + Send + Sync>);

    fn stats(&self) -> PoolStats;

    fn is_pooling(&self) -> bool;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Send + Sync> ErasedPool for ComponentPool<T> {
    fn release_erased(&mut self, instance: Box<dyn Any + Send + Sync>) {
        match instance.downcast::<T>() {
            Ok(instance) => self.release(instance),
            Err(_) => {
                debug_assert!(false, "instance released into the wrong pool");
                warn!(component = self.name, "dropping instance released into the wrong pool");
            }
        }
    }

    fn stats(&self) -> PoolStats {
        ComponentPool::stats(self)
    }

    fn is_pooling(&self) -> bool {
        ComponentPool::is_pooling(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
