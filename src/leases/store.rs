// Lease store: the in-memory snapshot of every active reservation
//
// The whole store is loaded once per invocation, mutated inside a
// single critical section, and saved once. A store that fails to load
// degrades to empty ("no known leases") rather than aborting; a store
// that fails to save is surfaced as a warning by the caller.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, warn};

use super::lease::{parse_lock_group, LeaseRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mapping of canonical node identifier to its lease record, plus the
/// set of lock-group ids recovered by the most recent sweep.
#[derive(Debug, Default)]
pub struct LeaseStore {
    records: BTreeMap<String, LeaseRecord>,
    lock_groups: BTreeSet<u32>,
}

impl LeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store from `path`. Any failure (missing file, bad JSON)
    /// degrades to an empty store.
    pub fn load(path: &Path) -> Self {
        let records = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(records) => records,
                Err(err) => {
                    warn!(path = %path.display(), %err, "unreadable lease store, starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no lease store yet, starting empty");
                BTreeMap::new()
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "cannot read lease store, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            records,
            lock_groups: BTreeSet::new(),
        }
    }

    /// Persist the store to `path`, creating parent directories as
    /// needed.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Drop every time-bound record whose expiration is strictly before
    /// `now`, and rebuild the lock-group id set from the `Permanent`
    /// records. Runs once per invocation, before the operation.
    pub fn sweep(&mut self, now: DateTime<Local>) {
        self.lock_groups.clear();
        let mut expired = Vec::new();
        for (id, record) in &self.records {
            if record.expiration.is_permanent() {
                if let Some(n) = parse_lock_group(&record.owner) {
                    self.lock_groups.insert(n);
                }
            } else if record.expiration.is_expired(now) {
                expired.push(id.clone());
            }
        }
        for id in expired {
            debug!(%id, "lease expired");
            self.records.remove(&id);
        }
    }

    /// Next unused lock-group id: one past the highest observed by the
    /// most recent sweep, or 1 when no permanent records exist.
    pub fn next_group_id(&self) -> u32 {
        self.lock_groups.last().map_or(1, |max| max + 1)
    }

    pub fn lock_groups(&self) -> &BTreeSet<u32> {
        &self.lock_groups
    }

    pub fn get(&self, id: &str) -> Option<&LeaseRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, id: &str, record: LeaseRecord) {
        self.records.insert(id.to_string(), record);
    }

    pub fn remove(&mut self, id: &str) -> Option<LeaseRecord> {
        self.records.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LeaseRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leases::lease::Expiration;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 24, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sweep_expires_stale_leases_only() {
        let mut store = LeaseStore::new();
        store.insert(
            "atom001",
            LeaseRecord::new(
                "alice",
                Expiration::Timestamp(now() - Duration::hours(1)),
                "",
            ),
        );
        store.insert(
            "atom002",
            LeaseRecord::new("bob", Expiration::Timestamp(now() + Duration::hours(1)), ""),
        );
        store.insert("atom003", LeaseRecord::new("LG3", Expiration::Permanent, ""));

        store.sweep(now());

        assert!(store.get("atom001").is_none());
        assert!(store.get("atom002").is_some());
        assert!(store.get("atom003").is_some());
        assert!(store.lock_groups().contains(&3));
    }

    #[test]
    fn test_next_group_id() {
        let mut store = LeaseStore::new();
        assert_eq!(store.next_group_id(), 1);

        store.insert("atom001", LeaseRecord::new("LG2", Expiration::Permanent, ""));
        store.insert("atom002", LeaseRecord::new("LG7", Expiration::Permanent, ""));
        store.sweep(now());
        assert_eq!(store.next_group_id(), 8);
    }

    #[test]
    fn test_sweep_ignores_non_group_permanent_owner() {
        // A permanent record with a foreign owner string must not panic
        // or register a group id.
        let mut store = LeaseStore::new();
        store.insert("atom001", LeaseRecord::new("ops", Expiration::Permanent, ""));
        store.sweep(now());
        assert!(store.lock_groups().is_empty());
        assert_eq!(store.next_group_id(), 1);
    }

    #[test]
    fn test_load_missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LeaseStore::load(&dir.path().join("nope.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leases.json");
        fs::write(&path, "not json").unwrap();
        let store = LeaseStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/leases.json");

        let mut store = LeaseStore::new();
        store.insert(
            "atom001",
            LeaseRecord::new("alice", Expiration::Timestamp(now()), "benchmarking"),
        );
        store.insert("atom002", LeaseRecord::new("LG1", Expiration::Permanent, "bad disk"));
        store.save(&path).unwrap();

        let reloaded = LeaseStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get("atom001"), store.get("atom001"));
        assert_eq!(reloaded.get("atom002"), store.get("atom002"));
    }
}
