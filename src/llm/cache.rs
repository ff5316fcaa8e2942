//! Bounded embedding cache keyed by content hash.
//!
//! Routing embeds every task text once per process. Repeated lookups of the
//! same text return the stored vector; the cache evicts the least recently
//! used entry when full and optionally expires entries after a TTL.
//!
//! ```ignore
//! use deckbench::llm::EmbeddingCache;
//!
//! let cache = EmbeddingCache::new(10_000);
//! if cache.get(text).is_none() {
//!     cache.insert(text, embedder.embed(request).await?);
//! }
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Hash of cached content for efficient lookup and comparison.
///
/// The hash is computed using SHA-256 and stored as a hex-encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new content hash from content string.
    pub fn from_content(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the hash string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    embedding: Vec<f64>,
    created_at: Instant,
    last_accessed: Instant,
}

/// Configuration for the embedding cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached vectors.
    pub max_entries: usize,
    /// Optional time-to-live; `None` keeps entries for the process lifetime.
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: None,
        }
    }
}

impl CacheConfig {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Hit/miss counters for the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Thread-safe text → embedding cache.
#[derive(Debug)]
pub struct EmbeddingCache {
    config: CacheConfig,
    entries: RwLock<HashMap<ContentHash, CacheEntry>>,
    stats: RwLock<CacheStats>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_entries` vectors.
    pub fn new(max_entries: usize) -> Self {
        Self::with_config(CacheConfig::new(max_entries))
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Look up the embedding for `text`, refreshing its recency on a hit.
    pub fn get(&self, text: &str) -> Option<Vec<f64>> {
        let hash = ContentHash::from_content(text);
        let now = Instant::now();

        let found = {
            let mut entries = self.entries.write().ok()?;
            let expired = match (entries.get(&hash), self.config.ttl) {
                (Some(entry), Some(ttl)) => now.duration_since(entry.created_at) > ttl,
                _ => false,
            };
            if expired {
                entries.remove(&hash);
                None
            } else {
                entries.get_mut(&hash).map(|entry| {
                    entry.last_accessed = now;
                    entry.embedding.clone()
                })
            }
        };

        if let Ok(mut stats) = self.stats.write() {
            if found.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
        found
    }

    /// Store the embedding for `text`, evicting the oldest entry when full.
    pub fn insert(&self, text: &str, embedding: Vec<f64>) {
        let hash = ContentHash::from_content(text);
        let now = Instant::now();

        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        if !entries.contains_key(&hash) && entries.len() >= self.config.max_entries {
            self.evict_oldest(&mut entries);
        }

        entries.insert(
            hash,
            CacheEntry {
                embedding,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    fn evict_oldest(&self, entries: &mut HashMap<ContentHash, CacheEntry>) {
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(hash, _)| hash.clone());

        if let Some(hash) = oldest {
            entries.remove(&hash);
            if let Ok(mut stats) = self.stats.write() {
                stats.evictions += 1;
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| *s).unwrap_or_default()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}
