//! Bounded cache for whole-document analysis results.
//!
//! Callers own the cache and inject it into whatever runs the analysis; there
//! is no process-global instance. [`BoundedCache`] is a small LRU guarded by a
//! [`Mutex`] that is held only for the lookup or the insert itself. A miss is
//! computed outside the lock and inserted afterwards, so two concurrent misses
//! on the same key may both compute; the second insert simply replaces the
//! first with an identical value.
//!
//! Keys combine a SHA-256 of the document bytes with everything else that can
//! change the result: file type, filename, the reference override, and
//! [`ENGINE_VERSION`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::ReferenceOverride;

/// Bumped whenever a change to segmentation, parsing or matching can change results.
pub const ENGINE_VERSION: &str = "citecheck-engine-1";

/// Default number of analysis results kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 3;

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Identifies one analysis: document content plus every input that affects the result.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CacheKey {
    pub content_hash: String,
    pub file_type: String,
    pub filename: String,
    pub override_signature: String,
    pub engine_version: &'static str,
}

impl CacheKey {
    pub fn new(
        content: &[u8],
        file_type: &str,
        filename: Option<&str>,
        reference_override: Option<&ReferenceOverride>,
    ) -> Self {
        Self {
            content_hash: sha256_hex(content),
            file_type: file_type.to_lowercase(),
            filename: filename.unwrap_or_default().to_string(),
            override_signature: override_signature(reference_override),
            engine_version: ENGINE_VERSION,
        }
    }
}

/// `items:<sha>`, `text:<sha>`, or `auto` when no override or blank text was given.
///
/// An item list is a request even when every item is blank, so it never maps to `auto`.
pub fn override_signature(reference_override: Option<&ReferenceOverride>) -> String {
    match reference_override {
        Some(o) if !o.is_requested() => "auto".to_string(),
        Some(ReferenceOverride::Items(items)) => {
            let joined = items
                .iter()
                .map(|i| i.trim())
                .filter(|i| !i.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            format!("items:{}", sha256_hex(joined.as_bytes()))
        }
        Some(ReferenceOverride::Text(text)) => {
            format!("text:{}", sha256_hex(text.trim().as_bytes()))
        }
        None => "auto".to_string(),
    }
}

/// Storage for computed results, injected into the analysis service.
pub trait ResultCache<V>: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<V>;
    fn insert(&self, key: CacheKey, value: V);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LruState<V> {
    entries: HashMap<CacheKey, V>,
    /// Least recently used at the front.
    order: VecDeque<CacheKey>,
}

impl<V> LruState<V> {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// In-memory LRU holding at most `capacity` results.
pub struct BoundedCache<V> {
    capacity: usize,
    state: Mutex<LruState<V>>,
}

impl<V: Clone + Send> BoundedCache<V> {
    /// A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(LruState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<V: Clone + Send> Default for BoundedCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<V: Clone + Send> ResultCache<V> for BoundedCache<V> {
    fn get(&self, key: &CacheKey) -> Option<V> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let value = state.entries.get(key).cloned();
        match value {
            Some(v) => {
                state.touch(key);
                tracing::trace!(hash = %key.content_hash, file = %key.filename, "analysis cache hit");
                Some(v)
            }
            None => {
                tracing::trace!(hash = %key.content_hash, file = %key.filename, "analysis cache miss");
                None
            }
        }
    }

    fn insert(&self, key: CacheKey, value: V) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.entries.insert(key.clone(), value).is_some() {
            state.touch(&key);
        } else {
            state.order.push_back(key);
        }
        while state.entries.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                    tracing::trace!(hash = %oldest.content_hash, "analysis cache evict");
                }
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// A cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<V> ResultCache<V> for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<V> {
        None
    }

    fn insert(&self, _key: CacheKey, _value: V) {}

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(content: &str) -> CacheKey {
        CacheKey::new(content.as_bytes(), "txt", Some("paper.txt"), None)
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let base = key("body");
        assert_eq!(base, key("body"));
        assert_ne!(base, key("other body"));
        assert_ne!(base, CacheKey::new(b"body", "md", Some("paper.txt"), None));
        assert_ne!(base, CacheKey::new(b"body", "txt", Some("draft.txt"), None));
        let with_override = CacheKey::new(
            b"body",
            "txt",
            Some("paper.txt"),
            Some(&ReferenceOverride::Text("Smith, J. (2020).".into())),
        );
        assert_ne!(base, with_override);
        assert_eq!(base.engine_version, ENGINE_VERSION);
    }

    #[test]
    fn test_override_signatures() {
        assert_eq!(override_signature(None), "auto");
        assert_eq!(override_signature(Some(&ReferenceOverride::Text("  ".into()))), "auto");
        assert!(override_signature(Some(&ReferenceOverride::Text("x".into()))).starts_with("text:"));
        let items = ReferenceOverride::Items(vec!["a".into(), " ".into(), "b".into()]);
        let same = ReferenceOverride::Items(vec!["a".into(), "b".into()]);
        assert!(override_signature(Some(&items)).starts_with("items:"));
        assert_eq!(override_signature(Some(&items)), override_signature(Some(&same)));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bounded_eviction_is_lru() {
        let cache: BoundedCache<u32> = BoundedCache::new(2);
        cache.insert(key("a"), 1);
        cache.insert(key("b"), 2);
        // Touch "a" so "b" becomes the oldest.
        assert_eq!(cache.get(&key("a")), Some(1));
        cache.insert(key("c"), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("b")), None);
        assert_eq!(cache.get(&key("a")), Some(1));
        assert_eq!(cache.get(&key("c")), Some(3));
    }

    #[test]
    fn test_reinsert_replaces_value() {
        let cache: BoundedCache<u32> = BoundedCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
        cache.insert(key("a"), 1);
        cache.insert(key("a"), 7);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("a")), Some(7));
    }

    #[test]
    fn test_no_cache() {
        let cache = NoCache;
        ResultCache::<u32>::insert(&cache, key("a"), 1);
        assert_eq!(ResultCache::<u32>::get(&cache, &key("a")), None);
        assert!(ResultCache::<u32>::is_empty(&cache));
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;
        let cache: Arc<BoundedCache<usize>> = Arc::new(BoundedCache::new(8));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.insert(key(&format!("doc{i}")), i))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
    }
}
