//! Epoch-scoped staking reward accounting.
//!
//! [`Ledger`] is the in-memory write model: the worker feeds it decoded
//! stake/unstake/eviction/claim events and checkpoint finalizations in chain
//! order, then drains the dirty entities for persistence after each batch.

mod checkpoint;
mod ledger;
mod median;
mod snapshot;

pub use checkpoint::CheckpointOutcome;
pub use ledger::{DirtyBatch, HistoryKey, Ledger, MembershipKey};
pub use median::MedianTracker;
