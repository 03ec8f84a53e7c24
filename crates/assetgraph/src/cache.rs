//! Memoization of traversal results.
//!
//! Entries are keyed by the normalized root set plus a [`RuleSignature`] and
//! stamped with the graph epoch they were computed at. Any graph mutation
//! advances the epoch, so an entry from an older epoch is never returned: it
//! is dropped the next time its key is looked up. Capacity overflow evicts the
//! oldest insertion.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use xxhash_rust::xxh3::xxh3_64;

use crate::domain::AssetId;
use crate::error::{Error, Result};
use crate::query::{QueryResult, TraversalRule};

/// Stable 64-bit fingerprint of a [`TraversalRule`].
///
/// xxh3 over the rule's JSON encoding. Sets inside the rule serialize in
/// sorted order, so equal rules always produce equal signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RuleSignature(u64);

impl RuleSignature {
    /// Compute the signature of a rule.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the rule cannot be encoded.
    pub fn of(rule: &TraversalRule) -> Result<Self> {
        let encoded = serde_json::to_vec(rule)?;
        Ok(Self(xxh3_64(&encoded)))
    }

    /// The raw hash value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    roots: Vec<AssetId>,
    signature: RuleSignature,
}

impl QueryKey {
    fn new(roots: &[AssetId], signature: RuleSignature) -> Self {
        let mut roots = roots.to_vec();
        roots.sort();
        roots.dedup();
        Self { roots, signature }
    }
}

#[derive(Debug)]
struct CacheEntry {
    rule: TraversalRule,
    result: Arc<QueryResult>,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<QueryKey, CacheEntry>,
    order: VecDeque<QueryKey>,
}

impl Entries {
    fn forget(&mut self, key: &QueryKey) {
        if self.map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to run the query
    pub misses: u64,
    /// Entries currently held (some may be stale until looked up)
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
}

/// Epoch-invalidated result cache, safe to share between query callers.
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results (0 disables caching).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("result cache lock poisoned".to_string()))
    }

    /// Look up a result computed at `epoch` for these roots and rule.
    ///
    /// An entry from another epoch is evicted and reported as a miss.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the cache lock is poisoned.
    pub fn get(
        &self,
        roots: &[AssetId],
        rule: &TraversalRule,
        signature: RuleSignature,
        epoch: u64,
    ) -> Result<Option<Arc<QueryResult>>> {
        let key = QueryKey::new(roots, signature);
        let mut entries = self.lock()?;

        let hit = match entries.map.get(&key) {
            Some(entry) if entry.result.epoch != epoch => {
                entries.forget(&key);
                None
            }
            Some(entry) if entry.rule == *rule => Some(Arc::clone(&entry.result)),
            _ => None,
        };

        let counter = if hit.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(hit)
    }

    /// Store a result under its own epoch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the cache lock is poisoned.
    pub fn put(
        &self,
        roots: &[AssetId],
        rule: &TraversalRule,
        signature: RuleSignature,
        result: Arc<QueryResult>,
    ) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        let key = QueryKey::new(roots, signature);
        let mut entries = self.lock()?;
        let entry = CacheEntry {
            rule: rule.clone(),
            result,
        };
        if entries.map.insert(key.clone(), entry).is_none() {
            entries.order.push_back(key);
        }

        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
        Ok(())
    }

    /// Drop every entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the cache lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        entries.map.clear();
        entries.order.clear();
        Ok(())
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the cache lock is poisoned.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock()?.map.len(),
            capacity: self.capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> AssetId {
        AssetId::new(format!("/Game/{name}"), name)
    }

    fn result_at(epoch: u64) -> Arc<QueryResult> {
        Arc::new(QueryResult {
            assets: vec![id("A")],
            epoch,
            ..QueryResult::default()
        })
    }

    #[test]
    fn equal_rules_share_a_signature() {
        let a = TraversalRule::dependencies().allow_types(["Material", "Texture2D"]);
        let b = TraversalRule::dependencies().allow_types(["Texture2D", "Material"]);
        assert_eq!(RuleSignature::of(&a).unwrap(), RuleSignature::of(&b).unwrap());

        let c = TraversalRule::dependents();
        assert_ne!(RuleSignature::of(&a).unwrap(), RuleSignature::of(&c).unwrap());
    }

    #[test]
    fn hit_requires_same_epoch_and_root_set() {
        let cache = ResultCache::new(8);
        let rule = TraversalRule::dependencies();
        let sig = RuleSignature::of(&rule).unwrap();

        cache.put(&[id("B"), id("A")], &rule, sig, result_at(3)).unwrap();

        assert!(cache.get(&[id("A"), id("B"), id("A")], &rule, sig, 3).unwrap().is_some());
        assert!(cache.get(&[id("A")], &rule, sig, 3).unwrap().is_none());

        let stats = cache.stats().unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn stale_epoch_is_never_a_hit_and_is_evicted() {
        let cache = ResultCache::new(8);
        let rule = TraversalRule::dependencies();
        let sig = RuleSignature::of(&rule).unwrap();
        cache.put(&[id("A")], &rule, sig, result_at(1)).unwrap();

        assert!(cache.get(&[id("A")], &rule, sig, 2).unwrap().is_none());
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn signature_collision_is_not_a_hit() {
        let cache = ResultCache::new(8);
        let rule = TraversalRule::dependencies();
        let other = TraversalRule::dependencies().max_depth(1);
        let sig = RuleSignature::of(&rule).unwrap();

        cache.put(&[id("A")], &rule, sig, result_at(1)).unwrap();
        assert!(cache.get(&[id("A")], &other, sig, 1).unwrap().is_none());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = ResultCache::new(2);
        let rule = TraversalRule::dependencies();
        let sig = RuleSignature::of(&rule).unwrap();
        for name in ["A", "B", "C"] {
            cache.put(&[id(name)], &rule, sig, result_at(1)).unwrap();
        }

        assert!(cache.get(&[id("A")], &rule, sig, 1).unwrap().is_none());
        assert!(cache.get(&[id("C")], &rule, sig, 1).unwrap().is_some());
        assert_eq!(cache.stats().unwrap().entries, 2);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ResultCache::new(0);
        let rule = TraversalRule::dependencies();
        let sig = RuleSignature::of(&rule).unwrap();
        cache.put(&[id("A")], &rule, sig, result_at(1)).unwrap();
        assert!(cache.get(&[id("A")], &rule, sig, 1).unwrap().is_none());
    }
}
