//! Compiled-program cache keyed by source content.
//!
//! Compiling an OpenCL program is orders of magnitude slower than a hash
//! lookup, so compiled handles are cached by a hash of their source text.
//! Compilation runs outside the lock; when two threads race to compile the
//! same source, the first insertion wins and the loser's handle is dropped.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Hash OpenCL source text into a cache key.
pub fn hash_source(source: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Thread-safe cache of compiled handles, keyed by source hash.
#[derive(Debug, Default)]
pub struct SourceCache<H> {
    entries: Mutex<HashMap<u64, H>>,
}

impl<H: Clone> SourceCache<H> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Cached handle for `key`, if any.
    pub fn get(&self, key: u64) -> Option<H> {
        self.lock().get(&key).cloned()
    }

    /// Return the cached handle for `key`, building it if absent.
    ///
    /// `build` runs without the lock held. A failed build caches nothing, so
    /// a later call retries.
    pub fn get_or_insert_with<E>(
        &self,
        key: u64,
        build: impl FnOnce() -> std::result::Result<H, E>,
    ) -> std::result::Result<H, E> {
        if let Some(handle) = self.lock().get(&key) {
            return Ok(handle.clone());
        }

        let built = build()?;
        Ok(self.lock().entry(key).or_insert(built).clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, H>> {
        // A panic mid-insert cannot leave the map in a torn state, so a
        // poisoned lock is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = "__kernel void k() {}";
        assert_eq!(hash_source(a), hash_source(a));
        assert_ne!(hash_source(a), hash_source("__kernel void k2() {}"));
    }

    #[test]
    fn second_lookup_skips_the_build() {
        let cache = SourceCache::<String>::new();
        let key = hash_source("src");
        let builds = AtomicUsize::new(0);

        for _ in 0..3 {
            let handle: Result<String, Infallible> = cache.get_or_insert_with(key, || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok("compiled".to_string())
            });
            assert_eq!(handle.unwrap(), "compiled");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache = SourceCache::<String>::new();
        let key = hash_source("bad");

        let first: Result<String, &str> = cache.get_or_insert_with(key, || Err("build log"));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second: Result<String, &str> = cache.get_or_insert_with(key, || Ok("fixed".into()));
        assert_eq!(second.unwrap(), "fixed");
    }

    #[test]
    fn distinct_sources_get_distinct_entries() {
        let cache = SourceCache::<usize>::new();
        let a: Result<usize, Infallible> = cache.get_or_insert_with(hash_source("a"), || Ok(1));
        let b: Result<usize, Infallible> = cache.get_or_insert_with(hash_source("b"), || Ok(2));
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn racing_inserts_converge_on_one_entry() {
        let cache = Arc::new(SourceCache::<usize>::new());
        let key = hash_source("shared");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let v: Result<usize, Infallible> =
                        cache.get_or_insert_with(key, || Ok(i));
                    v.unwrap()
                })
            })
            .collect();

        let results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        // First insertion wins; every caller observes that one handle.
        let winner = cache.get(key).unwrap();
        assert!(results.iter().all(|&r| r == winner));
    }
}
