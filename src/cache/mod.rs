//! Ancestor tile cache.
//!
//! During gap-fill the engine repeatedly fetches low-resolution ancestor
//! tiles; neighboring requests usually need the same ancestors, so fetched
//! payloads are memoized here under a time-to-live. Two invariants:
//!
//! - Only ancestor tiles fetched from the origin are stored. The originally
//!   requested tile and synthesized (filled) tiles never enter the cache.
//! - The cache is an optimization, never a correctness dependency. Backend
//!   failures are downgraded to a miss by the engine and logged.
//!
//! Concurrent writers on the same key may race; a lost update costs one
//! extra fetch, nothing more.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CacheError;
use crate::raster::TileAddress;

/// Default average key length hint.
pub const DEFAULT_KEY_LEN: usize = 64;

/// Default average object size hint: one encoded tile.
pub const DEFAULT_OBJ_SIZE: usize = 16 * 1024;

/// Default expiry interval.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Upper bound on the expiry interval.
pub const MAX_EXPIRY: Duration = Duration::from_secs(15 * 60);

/// Entry bound for the in-memory backend.
const DEFAULT_MAX_ENTRIES: usize = 1024;

// =============================================================================
// Key derivation
// =============================================================================

/// Cache key for an ancestor tile, scoped to one logical source.
///
/// `source` must already be normalized (routing prefix stripped, no leading
/// slash) so the key is stable regardless of the inbound URL shape. The
/// resulting `source/level/row/col` string is collision-free across
/// distinct (source, level, row, column) tuples.
pub fn ancestor_key(source: &str, tile: &TileAddress) -> String {
    format!("{}/{}/{}/{}", source, tile.level, tile.row, tile.col)
}

// =============================================================================
// Cache interface
// =============================================================================

/// Sizing and expiry hints, configured once and applied uniformly.
///
/// Mirrors the knobs a shared-object cache backend wants up front: average
/// key length, average object size, expiry interval. There is no per-entry
/// TTL override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHints {
    pub avg_key_len: usize,
    pub avg_obj_size: usize,
    pub expiry: Duration,
}

impl Default for CacheHints {
    fn default() -> Self {
        Self {
            avg_key_len: DEFAULT_KEY_LEN,
            avg_obj_size: DEFAULT_OBJ_SIZE,
            expiry: DEFAULT_EXPIRY,
        }
    }
}

impl CacheHints {
    /// Clamp the hints to sane bounds: keys up to 1 KiB, objects between
    /// 10 KiB and 1 MiB, expiry at most 15 minutes.
    pub fn clamped(self) -> Self {
        Self {
            avg_key_len: self.avg_key_len.min(1024),
            avg_obj_size: self.avg_obj_size.clamp(10 * 1024, 1024 * 1024),
            expiry: self.expiry.min(MAX_EXPIRY),
        }
    }
}

/// Key-value store for encoded ancestor tiles.
///
/// Any conforming backend satisfies the engine: the in-process
/// [`MemoryAncestorCache`], or an adapter over an external cache service.
/// Implementations must treat expired entries as absent.
#[async_trait]
pub trait AncestorCache: Send + Sync {
    /// Fetch the payload stored under `key`, if present and unexpired.
    async fn lookup(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store a payload under `key` with the configured TTL.
    async fn store(&self, key: &str, bytes: Bytes) -> Result<(), CacheError>;
}

// =============================================================================
// In-memory backend
// =============================================================================

struct CacheSlot {
    bytes: Bytes,
    expires_at: Instant,
}

/// In-process LRU backend with uniform TTL.
///
/// Thread-safe behind a `tokio` RwLock; shareable across tasks via `Arc`.
pub struct MemoryAncestorCache {
    entries: RwLock<LruCache<String, CacheSlot>>,
    ttl: Duration,
}

impl MemoryAncestorCache {
    /// Build a backend from hints, clamping them first.
    pub fn new(hints: CacheHints) -> Self {
        Self::with_capacity(hints, DEFAULT_MAX_ENTRIES)
    }

    /// Build a backend with an explicit entry bound.
    pub fn with_capacity(hints: CacheHints, max_entries: usize) -> Self {
        let hints = hints.clamped();
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl: hints.expiry,
        }
    }

    /// Number of live entries, counting expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AncestorCache for MemoryAncestorCache {
    async fn lookup(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if let Some(slot) = entries.get(key) {
            if slot.expires_at > now {
                return Ok(Some(slot.bytes.clone()));
            }
            entries.pop(key);
        }
        Ok(None)
    }

    async fn store(&self, key: &str, bytes: Bytes) -> Result<(), CacheError> {
        let slot = CacheSlot {
            bytes,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.put(key.to_string(), slot);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_lookup_miss() {
        let cache = MemoryAncestorCache::new(CacheHints::default());
        assert_eq!(cache.lookup("a/0/0/0").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let cache = MemoryAncestorCache::new(CacheHints::default());
        let payload = Bytes::from_static(b"tile bytes");
        cache.store("maps/3/1/2", payload.clone()).await.unwrap();
        assert_eq!(cache.lookup("maps/3/1/2").await.unwrap(), Some(payload));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_absent() {
        let hints = CacheHints {
            expiry: Duration::from_secs(60),
            ..CacheHints::default()
        };
        let cache = MemoryAncestorCache::new(hints);
        cache
            .store("maps/3/1/2", Bytes::from_static(b"x"))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.lookup("maps/3/1/2").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.lookup("maps/3/1/2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lru_eviction_at_capacity() {
        let cache = MemoryAncestorCache::with_capacity(CacheHints::default(), 2);
        cache.store("a", Bytes::from_static(b"1")).await.unwrap();
        cache.store("b", Bytes::from_static(b"2")).await.unwrap();
        cache.store("c", Bytes::from_static(b"3")).await.unwrap();
        assert!(cache.lookup("a").await.unwrap().is_none());
        assert!(cache.lookup("b").await.unwrap().is_some());
        assert!(cache.lookup("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_same_key() {
        let cache = MemoryAncestorCache::new(CacheHints::default());
        cache.store("k", Bytes::from_static(b"old")).await.unwrap();
        cache.store("k", Bytes::from_static(b"new")).await.unwrap();
        assert_eq!(
            cache.lookup("k").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_hints_clamping() {
        let hints = CacheHints {
            avg_key_len: 4096,
            avg_obj_size: 1,
            expiry: Duration::from_secs(3600),
        }
        .clamped();
        assert_eq!(hints.avg_key_len, 1024);
        assert_eq!(hints.avg_obj_size, 10 * 1024);
        assert_eq!(hints.expiry, MAX_EXPIRY);

        let hints = CacheHints {
            avg_obj_size: 8 * 1024 * 1024,
            ..CacheHints::default()
        }
        .clamped();
        assert_eq!(hints.avg_obj_size, 1024 * 1024);
    }

    #[test]
    fn test_key_shape() {
        let tile = TileAddress::new(4, 5, 6);
        assert_eq!(ancestor_key("maps/base", &tile), "maps/base/4/5/6");
    }

    #[test]
    fn test_key_injective_across_addresses() {
        // No collisions over a dense sweep of sources and coordinates.
        let mut seen = HashSet::new();
        for source in ["a", "b", "maps/base", "maps/base2"] {
            for level in 0..5u32 {
                for row in 0..8u32 {
                    for col in 0..8u32 {
                        let key = ancestor_key(source, &TileAddress::new(level, row, col));
                        assert!(seen.insert(key), "collision for {source} {level}/{row}/{col}");
                    }
                }
            }
        }
        assert_eq!(seen.len(), 4 * 5 * 8 * 8);
    }

    #[test]
    fn test_key_distinguishes_adjacent_digit_runs() {
        // "1/2" + "3" vs "1" + "2/3" style ambiguity
        let a = ancestor_key("s", &TileAddress::new(1, 23, 4));
        let b = ancestor_key("s", &TileAddress::new(12, 3, 4));
        assert_ne!(a, b);
    }
}
