//! A weak, self-evicting cache for painted sub-results.
//!
//! Entries are keyed by a signature of the paintable state that produced
//! them (color, text, bitmap identity) and held weakly: once the last
//! strong reference outside the cache drops, the entry is gone and the
//! next lookup recomputes. Callers must keep the returned `Arc` alive for
//! as long as they need the value.

use std::{
    any::Any,
    collections::{HashMap, hash_map::DefaultHasher},
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, Weak},
};

/// Signature of a paintable state.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Hash any value into a key. Callers fold everything that affects
    /// the cached output into the hashed value.
    pub fn of(value: &impl Hash) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Weakly-held cache shared between the UI thread and layer workers.
#[derive(Default)]
pub struct ComposerCache {
    entries: Mutex<HashMap<CacheKey, Weak<dyn Any + Send + Sync>>>,
}

impl ComposerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, invoking `calculate` at most once per live entry.
    /// Dead entries are pruned on every access.
    pub fn get_or_insert<T, F>(&self, key: CacheKey, calculate: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, weak| weak.strong_count() > 0);
        if let Some(hit) = entries.get(&key).and_then(Weak::upgrade) {
            if let Ok(value) = hit.downcast::<T>() {
                return value;
            }
        }
        let value = Arc::new(calculate());
        let any: Arc<dyn Any + Send + Sync> = value.clone();
        entries.insert(key, Arc::downgrade(&any));
        value
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_while_alive() {
        let cache = ComposerCache::new();
        let key = CacheKey::of(&("marker", "#888"));
        let mut calls = 0;
        let first: Arc<String> = cache.get_or_insert(key, || {
            calls += 1;
            "painted".to_string()
        });
        let second: Arc<String> = cache.get_or_insert(key, || {
            calls += 1;
            "painted again".to_string()
        });
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls, 1);
    }

    #[test]
    fn evicts_once_unreferenced() {
        let cache = ComposerCache::new();
        let key = CacheKey::of(&42u64);
        let value: Arc<u32> = cache.get_or_insert(key, || 1);
        assert_eq!(cache.len(), 1);
        drop(value);
        let again: Arc<u32> = cache.get_or_insert(key, || 2);
        assert_eq!(*again, 2);
        assert_eq!(cache.len(), 1);
    }
}
