//! Bounded LRU memoization of expensive query results.
//!
//! Entries are keyed by the query's argument tuple. Only successful results are
//! stored: an error from the underlying query propagates and leaves the cache
//! untouched. Nothing here invalidates entries when the knowledge base changes;
//! see [`QueryCaches::clear`].

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::error::AccessResult;
use crate::term::{Fort, FormulaList};

/// A thread-safe LRU cache of query outcomes.
pub struct ResultCache<K: Hash + Eq, V: Clone> {
    name: &'static str,
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> ResultCache<K, V> {
    /// Create a cache. A zero capacity is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached value for `key`, or run `compute` and remember its result.
    ///
    /// The lock is not held while `compute` runs, so two callers missing on the
    /// same key may both compute; the later store wins, which is harmless for
    /// deterministic queries.
    pub fn cached<F>(&self, key: K, compute: F) -> AccessResult<V>
    where
        F: FnOnce() -> AccessResult<V>,
    {
        if let Some(hit) = self.inner.lock().get(&key) {
            tracing::trace!(cache = self.name, "result cache hit");
            return Ok(hit.clone());
        }
        let value = compute()?;
        self.inner.lock().put(key, value.clone());
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<K: Hash + Eq, V: Clone> std::fmt::Debug for ResultCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// The four memoized query families of a session.
#[derive(Debug)]
pub struct QueryCaches {
    /// `(query, mt)` → is the ground query true.
    pub ask: ResultCache<(FormulaList, Fort), bool>,
    /// `(genl, spec)` → is `genl` a generalization of `spec`.
    pub genl: ResultCache<(Fort, Fort), bool>,
    /// `term` → is `term` a collection.
    pub collection: ResultCache<Fort, bool>,
    /// `(collection, mt)` → number of instances.
    pub count: ResultCache<(Fort, Fort), i64>,
}

impl QueryCaches {
    pub fn new(capacity: usize) -> Self {
        Self {
            ask: ResultCache::new("ask", capacity),
            genl: ResultCache::new("genl", capacity),
            collection: ResultCache::new("collection", capacity),
            count: ResultCache::new("count", capacity),
        }
    }

    pub fn clear(&self) {
        self.ask.clear();
        self.genl.clear();
        self.collection.clear();
        self.count.clear();
    }
}

impl Default for QueryCaches {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
