pub mod client;
pub mod ops;

pub use client::{BatchIngestor, ClickhouseClient};
pub use ops::{IngestMessage, StakingBatchMessage};
