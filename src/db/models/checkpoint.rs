use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indexer sync progress (PostgreSQL).
///
/// Last block fully processed for the configured network. Advanced only after
/// the relational flush completes, so a restart re-streams at most the
/// ClickHouse channel buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub chain_id: u64,
    pub last_indexed_block: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncCheckpoint {
    pub fn new(chain_id: u64, last_indexed_block: u64) -> Self {
        Self {
            chain_id,
            last_indexed_block,
            updated_at: Utc::now(),
        }
    }
}
