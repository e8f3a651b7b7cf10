// Lease and lock state engine
//
// Provides exclusive reservations over the node pool with:
// - Time-bounded user leases with refresh by the owner
// - Permanent admin lock groups ("LG<N>") released as a batch
// - Atomic multi-node acquire/release with full conflict reporting
// - Per-invocation expiry sweeping

pub mod engine;
pub mod lease;
pub mod store;

pub use engine::{LeaseEngine, LeaseError, NotifyHook};
pub use lease::{lock_group_owner, parse_lock_group, Expiration, LeaseRecord};
pub use store::{LeaseStore, StoreError};
