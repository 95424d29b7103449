//! Program caching for parsed scripts.
//!
//! Provides LRU-based caching of parsed programs using BLAKE3 hashes of the
//! script text as keys, so repeated invocations of the same script skip the
//! lexer and parser.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::cache::ProgramCache;
//!
//! let cache = ProgramCache::new(100);
//! let key = ProgramCache::cache_key_for_script("const a = 1;");
//! assert!(key.as_str().starts_with("script_"));
//! ```

use crate::interp::Program;
use blake3::Hasher;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cache key for parsed programs.
///
/// # Examples
///
/// ```
/// use tenant_script_runtime::cache::CacheKey;
///
/// let key1 = CacheKey::new("abc123");
/// let key2 = CacheKey::new("abc123");
/// assert_eq!(key1, key2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a new cache key.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Returns the cache key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// LRU cache of parsed programs.
///
/// # Thread Safety
///
/// This type is `Send` and `Sync`, using `Mutex` for safe concurrent access.
pub struct ProgramCache {
    cache: Mutex<lru::LruCache<CacheKey, Arc<Program>>>,
}

impl std::fmt::Debug for ProgramCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl ProgramCache {
    /// Creates a cache holding up to `capacity` programs (at least one).
    ///
    /// # Examples
    ///
    /// ```
    /// use tenant_script_runtime::cache::ProgramCache;
    ///
    /// assert_eq!(ProgramCache::new(50).capacity(), 50);
    /// assert_eq!(ProgramCache::new(0).capacity(), 1);
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    /// Generates a cache key from script text.
    #[must_use]
    pub fn cache_key_for_script(script: &str) -> CacheKey {
        let mut hasher = Hasher::new();
        hasher.update(script.as_bytes());
        CacheKey::new(format!("script_{}", hasher.finalize().to_hex()))
    }

    fn lock(&self) -> MutexGuard<'_, lru::LruCache<CacheKey, Arc<Program>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets a program, updating LRU order on hit.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Program>> {
        self.lock().get(key).cloned()
    }

    /// Inserts a program, evicting the least recently used one when full.
    pub fn insert(&self, key: CacheKey, program: Arc<Program>) {
        let mut cache = self.lock();
        let preview: String = key.as_str().chars().take(16).collect();
        cache.put(key, program);
        tracing::debug!("Program cached: {} (cache size: {})", preview, cache.len());
    }

    /// Checks if a key exists in the cache.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.lock().clear();
        tracing::info!("Program cache cleared");
    }

    /// Returns the number of cached programs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cache capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp;

    fn program(source: &str) -> Arc<Program> {
        Arc::new(interp::parse(source, 64).unwrap())
    }

    #[test]
    fn test_cache_key_deterministic() {
        let key1 = ProgramCache::cache_key_for_script("ui.toast('a')");
        let key2 = ProgramCache::cache_key_for_script("ui.toast('a')");
        let key3 = ProgramCache::cache_key_for_script("ui.toast('b')");
        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_eq!(key1.as_str().len(), "script_".len() + 64);
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ProgramCache::new(4);
        let key = ProgramCache::cache_key_for_script("const a = 1;");
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), program("const a = 1;"));
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ProgramCache::new(2);
        let keys: Vec<_> = ["a;", "b;", "c;"]
            .iter()
            .map(|s| ProgramCache::cache_key_for_script(s))
            .collect();

        cache.insert(keys[0].clone(), program("a;"));
        cache.insert(keys[1].clone(), program("b;"));
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get(&keys[0]).is_some());
        cache.insert(keys[2].clone(), program("c;"));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&keys[0]));
        assert!(!cache.contains(&keys[1]));
        assert!(cache.contains(&keys[2]));
    }

    #[test]
    fn test_clear() {
        let cache = ProgramCache::new(2);
        cache.insert(ProgramCache::cache_key_for_script("a;"), program("a;"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
