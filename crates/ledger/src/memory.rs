use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{DedupLedger, EventId, LedgerError, Result};

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    entries: HashMap<EventId, Instant>,
    unavailable: bool,
    fail_on_record: bool,
}

/// In-memory ledger for testing.
///
/// Same expiry semantics as [`crate::SqliteLedger`]; cloning shares the
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`LedgerError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Makes subsequent `record` calls fail while lookups keep working.
    pub async fn set_fail_on_record(&self, fail: bool) {
        self.state.write().await.fail_on_record = fail;
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn unavailable() -> LedgerError {
    LedgerError::Unavailable("in-memory ledger switched off".to_string())
}

#[async_trait]
impl DedupLedger for InMemoryLedger {
    async fn exists(&self, id: &EventId) -> Result<bool> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state
            .entries
            .get(id)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn record(&self, id: &EventId, ttl: Duration) -> Result<()> {
        let mut state = self.state.write().await;
        if state.unavailable || state.fail_on_record {
            return Err(unavailable());
        }
        state.entries.insert(id.clone(), Instant::now() + ttl);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable());
        }
        let now = Instant::now();
        let before = state.entries.len();
        state.entries.retain(|_, expires_at| *expires_at > now);
        Ok((before - state.entries.len()) as u64)
    }
}
