use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use log::trace;
use parking_lot::Mutex;

use crate::compiled::CompiledRegex;
use crate::error::RegexSyntaxError;
use crate::source::RegexSource;

/// What a compile request produced. Syntax errors are cached too, so a bad
/// pattern is parsed only once.
pub type CacheEntry = Result<Arc<CompiledRegex>, RegexSyntaxError>;

/// Counters of one cache, read with [`RegexEngine::stats`](crate::RegexEngine::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub compilations: u64,
    pub evictions: u64,
}

/// Bounded LRU map from source to compile result.
///
/// The map keeps insertion order; a hit moves its entry to the back, and
/// eviction takes from the front.
#[derive(Debug)]
pub struct PatternCache {
    capacity: usize,
    entries: Mutex<IndexMap<RegexSource, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    evictions: AtomicU64,
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compilations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, source: &RegexSource) -> bool {
        self.entries.lock().contains_key(source)
    }

    pub fn get(&self, source: &RegexSource) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        match entries.get_index_of(source) {
            Some(idx) => {
                let last = entries.len() - 1;
                entries.move_index(idx, last);
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("cache hit for {source}");
                Some(entries[last].clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("cache miss for {source}");
                None
            }
        }
    }

    /// Store `entry` as the most recently used one, evicting from the front
    /// until the capacity holds again. A concurrent insert of the same
    /// source simply replaces the earlier one.
    pub fn insert(&self, source: RegexSource, entry: CacheEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        let (idx, _) = entries.insert_full(source, entry);
        let last = entries.len() - 1;
        entries.move_index(idx, last);
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!("evicted {evicted}");
            }
        }
    }

    pub(crate) fn record_compilation(&self) {
        self.compilations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
