//! Bounded LRU result cache.
//!
//! Keyed by the exact query string plus the evaluation mode and
//! highlight flag it was run with — two textually-identical queries
//! run under different modes or highlight settings are different cache
//! entries, since both affect the result. Capacity 0 disables caching
//! outright (every `get` misses, every `put` is a no-op).

use crate::ast::Highlights;
use crate::ids::DocId;
use crate::indices::EvaluationMode;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    mode: EvaluationMode,
    highlight: bool,
}

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub docs: Vec<DocId>,
    pub highlights: Highlights,
}

struct Inner {
    capacity: usize,
    entries: HashMap<CacheKey, CachedResult>,
    /// Most-recently-used last; linear eviction scan is fine at the
    /// capacities this cache is meant to run at (hundreds, not millions).
    recency: Vec<CacheKey>,
}

pub struct ResultCache {
    inner: Mutex<Inner>,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(Inner { capacity, entries: HashMap::new(), recency: Vec::new() }) }
    }

    pub fn get(&self, query: &str, mode: EvaluationMode, highlight: bool) -> Option<CachedResult> {
        if self.capacity() == 0 {
            return None;
        }
        let key = CacheKey { query: query.to_string(), mode, highlight };
        let mut inner = self.inner.lock();
        let result = inner.entries.get(&key).cloned();
        if result.is_some() {
            inner.recency.retain(|k| k != &key);
            inner.recency.push(key);
        }
        result
    }

    pub fn put(&self, query: &str, mode: EvaluationMode, highlight: bool, result: CachedResult) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        let key = CacheKey { query: query.to_string(), mode, highlight };
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= capacity {
            if let Some(oldest) = (!inner.recency.is_empty()).then(|| inner.recency.remove(0)) {
                inner.entries.remove(&oldest);
            }
        }
        inner.recency.retain(|k| k != &key);
        inner.recency.push(key.clone());
        inner.entries.insert(key, result);
    }

    /// Invalidate every entry, e.g. after the engine's metadata changes.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
