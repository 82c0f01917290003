//! List cache keyed by (endpoint, filter set), with optimistic mutation commands and rollback snapshots.
//!
//! Each endpoint carries a generation that moves on every optimistic command and invalidation.
//! Network results and rollbacks only land when the generation they were taken at is still current.

use crate::client::FilterSet;
use crate::response::{record_id, ListPayload, Record};
use lru::LruCache;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::num::NonZeroUsize;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub endpoint: String,
    pub filters: FilterSet,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>, filters: FilterSet) -> Self {
        CacheKey {
            endpoint: endpoint.into(),
            filters,
        }
    }
}

/// An optimistic mutation, applied to every cached list of an endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheCommand {
    /// Append a record (carrying a temporary id).
    Create { record: Record },
    /// Merge fields into the record with this id.
    Update { id: String, patch: Map<String, Value> },
    Delete { id: String },
}

/// Pure reducer: the list as it looks after `command`. The input is never modified.
pub fn apply_command(list: &ListPayload, command: &CacheCommand) -> ListPayload {
    let mut next = list.clone();
    match command {
        CacheCommand::Create { record } => {
            next.data.push(record.clone());
            next.count += 1;
        }
        CacheCommand::Update { id, patch } => {
            if let Some(Value::Object(existing)) = next
                .data
                .iter_mut()
                .find(|r| record_id(r) == Some(id.as_str()))
            {
                for (k, v) in patch {
                    existing.insert(k.clone(), v.clone());
                }
            }
        }
        CacheCommand::Delete { id } => {
            if let Some(pos) = next.position(id) {
                next.data.remove(pos);
                next.count = next.count.saturating_sub(1);
            }
        }
    }
    next
}

/// Pre-mutation state of every list a command touched, and the generation the command produced.
#[derive(Clone, Debug, Default)]
pub struct CacheSnapshot {
    generation: u64,
    entries: Vec<(CacheKey, ListPayload)>,
}

impl CacheSnapshot {
    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ListCache {
    inner: LruCache<CacheKey, ListPayload>,
    generations: HashMap<String, u64>,
}

impl ListCache {
    pub fn new(capacity: usize) -> Self {
        ListCache {
            inner: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            generations: HashMap::new(),
        }
    }

    /// Current generation of `endpoint`; 0 until the first command or invalidation.
    pub fn generation(&self, endpoint: &str) -> u64 {
        self.generations.get(endpoint).copied().unwrap_or(0)
    }

    fn bump(&mut self, endpoint: &str) -> u64 {
        let g = self.generations.entry(endpoint.to_string()).or_insert(0);
        *g += 1;
        *g
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<ListPayload> {
        self.inner.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, payload: ListPayload) {
        self.inner.put(key, payload);
    }

    /// Insert a network result fetched while the endpoint was at `generation`.
    /// Returns false, leaving the cache alone, when a command or invalidation happened since.
    pub fn insert_if_current(&mut self, key: CacheKey, payload: ListPayload, generation: u64) -> bool {
        if self.generation(&key.endpoint) != generation {
            return false;
        }
        self.inner.put(key, payload);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn keys_for(&self, endpoint: &str) -> Vec<CacheKey> {
        self.inner
            .iter()
            .filter(|(k, _)| k.endpoint == endpoint)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Drop every cached list of `endpoint`. Returns the dropped keys.
    pub fn invalidate_endpoint(&mut self, endpoint: &str) -> Vec<CacheKey> {
        self.bump(endpoint);
        let keys = self.keys_for(endpoint);
        for k in &keys {
            self.inner.pop(k);
        }
        keys
    }

    /// Apply `command` to every cached list of `endpoint`, returning what they held before.
    pub fn apply(&mut self, endpoint: &str, command: &CacheCommand) -> CacheSnapshot {
        let generation = self.bump(endpoint);
        let mut entries = Vec::new();
        for key in self.keys_for(endpoint) {
            if let Some(current) = self.inner.peek(&key) {
                let next = apply_command(current, command);
                entries.push((key.clone(), current.clone()));
                self.inner.put(key, next);
            }
        }
        CacheSnapshot { generation, entries }
    }

    /// Put back exactly what a snapshot recorded, provided nothing touched the endpoint since.
    /// Returns false when the snapshot is outdated; the caller must drop and refetch instead.
    pub fn restore(&mut self, endpoint: &str, snapshot: CacheSnapshot) -> bool {
        if self.generation(endpoint) != snapshot.generation {
            return false;
        }
        for (key, payload) in snapshot.entries {
            self.inner.put(key, payload);
        }
        true
    }
}
