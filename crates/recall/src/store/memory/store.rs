//! In-memory store implementation.
//!
//! Mirrors the subset of Redis semantics the cache relies on:
//! - String values and sets share one keyspace; using a key as the wrong type fails
//! - Expiry is per key and lazy (expired keys read as absent and are purged on write)
//! - `SCAN` cursors stay valid while keys are deleted between rounds
//!
//! There is no eviction. Memory is reclaimed only through expiry, deletes and flush.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use recall_core::cache::{pattern_matches, CacheError, Connector, Result, StoreConnection};

#[derive(Debug, Clone)]
enum Stored {
    Value(String),
    Set(BTreeSet<String>),
}

/// A single stored key with optional expiration.
#[derive(Debug, Clone)]
struct StoreEntry {
    /// Position in the scan order; assigned once when the key is created.
    slot: u64,
    stored: Stored,
    expires_at: Option<Instant>,
}

/// Deadline for a TTL starting now. A TTL past the clock's range never expires.
fn deadline(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

impl StoreEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, StoreEntry>,
    /// Scan order: slot -> key. Slots only grow, so deleting a key never moves another.
    slots: BTreeMap<u64, String>,
    next_slot: u64,
}

impl Keyspace {
    fn live(&self, key: &str) -> Option<&StoreEntry> {
        self.entries.get(key).filter(|entry| !entry.is_expired())
    }

    fn remove(&mut self, key: &str) -> Option<StoreEntry> {
        let entry = self.entries.remove(key)?;
        self.slots.remove(&entry.slot);
        Some(entry)
    }

    fn purge_expired(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(StoreEntry::is_expired) {
            self.remove(key);
        }
    }

    fn insert(&mut self, key: &str, stored: Stored, expires_at: Option<Instant>) {
        self.purge_expired(key);
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stored = stored;
            entry.expires_at = expires_at;
            return;
        }

        self.next_slot += 1;
        let slot = self.next_slot;
        self.slots.insert(slot, key.to_string());
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                slot,
                stored,
                expires_at,
            },
        );
    }

    /// Returns the live set at `key`, creating it if absent.
    fn set_mut(&mut self, key: &str) -> Result<&mut StoreEntry> {
        self.purge_expired(key);
        if !self.entries.contains_key(key) {
            self.insert(key, Stored::Set(BTreeSet::new()), None);
        }

        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| CacheError::OperationFailed(format!("set {key} vanished")))?;
        if !matches!(entry.stored, Stored::Set(_)) {
            return Err(wrong_type(key));
        }
        Ok(entry)
    }
}

fn wrong_type(key: &str) -> CacheError {
    CacheError::OperationFailed(format!(
        "WRONGTYPE Operation against a key holding the wrong kind of value: {key}"
    ))
}

/// In-process store with TTL, sets and cursor scans.
///
/// Cloning is cheap and every clone shares the same keyspace, so a
/// `MemoryStore` is its own [`Connector`]: connecting hands out a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keyspace: Arc<RwLock<Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remaining time to live of `key`, if it exists and expires.
    pub async fn time_to_live(&self, key: &str) -> Option<Duration> {
        let keyspace = self.keyspace.read().await;
        keyspace
            .live(key)
            .and_then(|entry| entry.expires_at)
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Returns true if `key` exists and has not expired.
    pub async fn contains(&self, key: &str) -> bool {
        self.keyspace.read().await.live(key).is_some()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let keyspace = self.keyspace.read().await;
        keyspace
            .entries
            .values()
            .filter(|entry| !entry.is_expired())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl StoreConnection for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let keyspace = self.keyspace.read().await;
        match keyspace.live(key) {
            Some(StoreEntry {
                stored: Stored::Value(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.insert(
            key,
            Stored::Value(value.to_string()),
            deadline(ttl),
        );
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str, set_ttl: Duration) -> Result<()> {
        let mut keyspace = self.keyspace.write().await;
        let entry = keyspace.set_mut(key)?;
        if let Stored::Set(members) = &mut entry.stored {
            members.insert(member.to_string());
        }
        entry.expires_at = deadline(set_ttl);
        Ok(())
    }

    async fn create_set(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut keyspace = self.keyspace.write().await;
        let entry = keyspace.set_mut(key)?;
        let mut added = 0;
        if let Stored::Set(existing) = &mut entry.stored {
            for member in members {
                if existing.insert(member.clone()) {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    async fn pop_from_set(&self, key: &str) -> Result<Option<String>> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.purge_expired(key);

        let (popped, now_empty) = match keyspace.entries.get_mut(key) {
            Some(StoreEntry {
                stored: Stored::Set(members),
                ..
            }) => {
                let popped = members.pop_first();
                (popped, members.is_empty())
            }
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(None),
        };

        // Redis removes a set once its last member is gone.
        if now_empty {
            keyspace.remove(key);
        }
        Ok(popped)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let keyspace = self.keyspace.read().await;
        match keyspace.live(key) {
            Some(StoreEntry {
                stored: Stored::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut keyspace = self.keyspace.write().await;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = keyspace.remove(key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<(u64, Vec<String>)> {
        let keyspace = self.keyspace.read().await;

        let mut matches = Vec::new();
        let mut last_slot = None;
        for (slot, key) in keyspace.slots.range(cursor..).take(count.max(1)) {
            last_slot = Some(*slot);
            if keyspace.live(key).is_some() && pattern_matches(pattern, key) {
                matches.push(key.clone());
            }
        }

        let next_cursor = match last_slot {
            Some(slot) if keyspace.slots.range(slot + 1..).next().is_some() => slot + 1,
            _ => 0,
        };
        Ok((next_cursor, matches))
    }

    async fn flush_all(&self) -> Result<()> {
        let mut keyspace = self.keyspace.write().await;
        keyspace.entries.clear();
        keyspace.slots.clear();
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryStore {
    type Connection = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        Ok(self.clone())
    }
}
