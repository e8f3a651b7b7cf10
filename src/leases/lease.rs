// Core lease data structures

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// When a lease ends: an absolute timestamp, or never. `Permanent` is a
/// distinct variant rather than a sentinel string so it can never be
/// mistaken for (or compared against) a real timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    Timestamp(DateTime<Local>),
    Permanent,
}

impl Expiration {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Expiration::Permanent)
    }

    /// Whether this expiration has passed. Permanent leases never expire.
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        match self {
            Expiration::Timestamp(t) => *t < now,
            Expiration::Permanent => false,
        }
    }
}

/// One node's reservation: who holds it, until when, and why. The owner
/// is either a user identity or a synthetic lock-group identity
/// (`"LG<N>"`) for permanently quarantined nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub owner: String,
    pub expiration: Expiration,
    pub message: String,
}

impl LeaseRecord {
    pub fn new(owner: &str, expiration: Expiration, message: &str) -> Self {
        Self {
            owner: owner.to_string(),
            expiration,
            message: message.to_string(),
        }
    }
}

/// Render the synthetic owner identity for lock group `n`.
pub fn lock_group_owner(n: u32) -> String {
    format!("LG{n}")
}

/// Parse a lock-group owner identity back into its group number.
pub fn parse_lock_group(owner: &str) -> Option<u32> {
    owner.strip_prefix("LG")?.parse().ok()
}
