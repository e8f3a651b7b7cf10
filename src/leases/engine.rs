// Availability checks and atomic multi-node acquire/release
//
// The engine is built fresh per invocation around the loaded store and
// the static topology. Every operation is all-or-nothing: a request
// that fails validation or hits a conflict mutates nothing and
// enumerates every offending node.

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use super::lease::{Expiration, LeaseRecord};
use super::store::LeaseStore;
use crate::topology::Topology;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("the following nodes are unavailable: {}", ids.join(", "))]
    Unavailable { ids: Vec<String> },

    #[error("permission to release the following nodes denied: {}", ids.join(", "))]
    Denied { ids: Vec<String> },
}

/// Called once with the full affected id set after every successful
/// acquire or release. The transport behind it (remote cleanup script,
/// HTTP, queue) is the caller's business; failures in it never roll
/// back the operation.
pub type NotifyHook<'a> = Box<dyn FnMut(&[String]) + 'a>;

pub struct LeaseEngine<'a> {
    topology: &'a Topology,
    store: LeaseStore,
    notify: Option<NotifyHook<'a>>,
}

impl<'a> LeaseEngine<'a> {
    pub fn new(topology: &'a Topology, store: LeaseStore) -> Self {
        Self {
            topology,
            store,
            notify: None,
        }
    }

    pub fn with_notify(mut self, hook: NotifyHook<'a>) -> Self {
        self.notify = Some(hook);
        self
    }

    pub fn store(&self) -> &LeaseStore {
        &self.store
    }

    pub fn into_store(self) -> LeaseStore {
        self.store
    }

    /// Expire stale leases and rebuild the lock-group registry. Must run
    /// before the operation, inside the same critical section.
    pub fn sweep(&mut self, now: DateTime<Local>) {
        self.store.sweep(now);
    }

    pub fn next_group_id(&self) -> u32 {
        self.store.next_group_id()
    }

    /// A node is available to `user` iff it belongs to a configured
    /// cluster and is either free or already held by `user`.
    pub fn available(&self, id: &str, user: &str) -> bool {
        if !self.topology.contains(id) {
            return false;
        }
        match self.store.get(id) {
            None => true,
            Some(record) => record.owner == user,
        }
    }

    /// Reserve every id for `owner`, or reserve nothing. Re-acquiring a
    /// node already held by `owner` refreshes its record in place.
    pub fn acquire(
        &mut self,
        ids: &[String],
        owner: &str,
        expiration: Expiration,
        message: &str,
    ) -> Result<Vec<String>, LeaseError> {
        let unavailable: Vec<String> = ids
            .iter()
            .filter(|id| !self.available(id, owner))
            .cloned()
            .collect();
        if !unavailable.is_empty() {
            return Err(LeaseError::Unavailable { ids: unavailable });
        }
        for id in ids {
            self.store
                .insert(id, LeaseRecord::new(owner, expiration.clone(), message));
        }
        info!(%owner, count = ids.len(), "acquired");
        self.fire_notify(ids);
        Ok(ids.to_vec())
    }

    /// Release every record matched by `targets` (by node id, or by
    /// owner string to empty out a user or lock group), or release
    /// nothing. Without `force`, a single candidate owned by someone
    /// else denies the whole batch.
    pub fn release(
        &mut self,
        targets: &[String],
        user: &str,
        force: bool,
    ) -> Result<Vec<String>, LeaseError> {
        let mut released = Vec::new();
        let mut denied = Vec::new();
        for (id, record) in self.store.iter() {
            let is_target =
                targets.iter().any(|t| t == id) || targets.iter().any(|t| *t == record.owner);
            if !is_target {
                continue;
            }
            if record.owner != user && !force {
                denied.push(id.clone());
            } else {
                released.push(id.clone());
            }
        }
        if !denied.is_empty() {
            return Err(LeaseError::Denied { ids: denied });
        }
        for id in &released {
            self.store.remove(id);
        }
        info!(%user, count = released.len(), "released");
        self.fire_notify(&released);
        Ok(released)
    }

    fn fire_notify(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        if let Some(hook) = self.notify.as_mut() {
            hook(ids);
        }
    }
}
