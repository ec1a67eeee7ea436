//! Deduplication ledger for idempotent consumers.
//!
//! A consumer records the id of every event it has handled and skips ids it
//! already knows. Records carry a time-to-live; once it lapses the id is
//! treated as unseen again.
//!
//! - [`SqliteLedger`]: durable, one database file per service instance
//! - [`InMemoryLedger`]: test double with an "unavailable" switch

pub mod error;
mod memory;
mod sqlite;

pub use common::EventId;
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use sqlite::SqliteLedger;

use std::time::Duration;

use async_trait::async_trait;

/// How long a processed event id is remembered by default (7 days).
pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Marker value stored for every recorded id.
pub(crate) const MARKER: &str = "1";

/// Durable key/expiry store of processed event ids.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Returns whether `id` was recorded and has not expired yet.
    async fn exists(&self, id: &EventId) -> Result<bool>;

    /// Records `id` as processed for `ttl`.
    ///
    /// Recording an id that is already present overwrites its expiry.
    async fn record(&self, id: &EventId, ttl: Duration) -> Result<()>;

    /// Deletes expired records, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

impl std::fmt::Debug for dyn DedupLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DedupLedger")
    }
}
