use config::{Config, ConfigError, File};
use serde::Deserialize;

/// ClickHouse database connection and batching configuration.
///
/// Controls connection settings and dual-channel batch ingestion:
/// - Historical: High-throughput batching for chain sync (large batches, longer waits)
/// - Live: Low-latency batching for real-time data (small batches, short waits)
#[derive(Debug, Deserialize, Clone)]
pub struct ClickHouseSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    // Historical ingestor (high-throughput sync)
    #[serde(default = "default_historical_batch_size")]
    pub historical_batch_size: usize,
    #[serde(default = "default_historical_max_wait_secs")]
    pub historical_max_wait_secs: usize,
    // Live ingestor (low-latency real-time)
    #[serde(default = "default_live_batch_size")]
    pub live_batch_size: usize,
    #[serde(default = "default_live_max_wait_ms")]
    pub live_max_wait_ms: usize,
}

fn default_historical_batch_size() -> usize {
    1_000_000
}

fn default_historical_max_wait_secs() -> usize {
    10
}

fn default_live_batch_size() -> usize {
    1_000
}

fn default_live_max_wait_ms() -> usize {
    100
}

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Staking contract registry and parameters
/// - Service reward ledger entities
/// - Sync checkpoints
/// - Daily aggregate snapshots
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// HyperSync indexer configuration.
///
/// HyperSync provides high-performance blockchain data streaming
/// with sub-second latency for real-time indexing.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexerSettings {
    pub hypersync_bearer_token: String,
    #[serde(default = "default_tip_poll_interval")]
    pub tip_poll_interval_milliseconds: u64,
}

fn default_tip_poll_interval() -> u64 {
    200
}

/// The network this deployment indexes.
///
/// One process indexes one chain; running against a second chain is a second
/// deployment with its own config file.
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkSettings {
    pub chain_id: u64,
    pub name: String,
    /// HyperSync endpoint for this chain (e.g., "https://gnosis.hypersync.xyz")
    pub hypersync_url: String,
    /// JSON-RPC endpoint used for contract parameter reads
    pub rpc_url: String,
    /// Staking proxy factory whose InstanceCreated events seed the contract set
    pub staking_factory: String,
    /// Block the factory was deployed at; initial sync starts here
    pub start_block: u64,
    /// Decimals of the staking token (OLAS uses 18)
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
}

fn default_token_decimals() -> u8 {
    18
}

/// Redpanda (Kafka-compatible) pub/sub configuration.
///
/// When enabled, streams real-time staking events to Redpanda topics
/// for external consumers. Only publishes data when indexer is at chain tip.
#[derive(Debug, Deserialize, Clone)]
pub struct RedpandaSettings {
    /// Enable/disable Redpanda publishing
    #[serde(default)]
    pub enabled: bool,
    /// Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[serde(default = "default_redpanda_brokers")]
    pub brokers: String,
    /// Topic name prefix (topics: {prefix}.staking_events.{chain_id}, etc.)
    #[serde(default = "default_redpanda_topic_prefix")]
    pub topic_prefix: String,
}

fn default_redpanda_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_redpanda_topic_prefix() -> String {
    "stakemark".to_string()
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
/// Contains all subsystem configurations for databases and indexer.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub clickhouse: ClickHouseSettings,
    pub postgres: PostgresSettings,
    pub indexer: IndexerSettings,
    pub network: NetworkSettings,
    #[serde(default)]
    pub redpanda: Option<RedpandaSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
