use std::time::Duration;

use anyhow::Context;
use clickhouse::{inserter::Inserter, Client};
use log::info;
use tokio::sync::mpsc;

use crate::{
    config::ClickHouseSettings,
    db::{
        clickhouse::ops::IngestMessage,
        models::{RewardUpdate, StakingEvent},
    },
};

pub struct ClickhouseClient {
    pub client: Client,
}

/// Configuration for creating inserters with specific thresholds
#[derive(Clone)]
pub struct InserterConfig {
    pub max_rows: u64,
    pub max_bytes: u64,
    pub period: Duration,
}

pub struct BatchIngestor {
    pub label: &'static str,
    pub client: Client,
    pub receiver: mpsc::Receiver<IngestMessage>,
    pub config: InserterConfig,

    // Inserters for each data type - use clickhouse-rs built-in batching
    pub staking_event_inserter: Inserter<StakingEvent>,
    pub reward_update_inserter: Inserter<RewardUpdate>,

    // Optional Redpanda publisher for live streaming (only used by LIVE ingestor)
    pub redpanda_publisher: Option<crate::pubsub::RedpandaPublisher>,
}

impl BatchIngestor {
    /// Create a new inserter with the given configuration
    fn create_inserter<T: clickhouse::Row>(
        client: &Client,
        table: &str,
        config: &InserterConfig,
    ) -> Inserter<T> {
        client
            .inserter::<T>(table)
            .with_max_rows(config.max_rows)
            .with_max_bytes(config.max_bytes)
            .with_period(Some(config.period))
            .with_period_bias(0.1) // 10% bias to avoid synchronized flushes
    }

    fn new(
        label: &'static str,
        client: &Client,
        receiver: mpsc::Receiver<IngestMessage>,
        config: InserterConfig,
    ) -> Self {
        Self {
            label,
            client: client.clone(),
            receiver,
            staking_event_inserter: Self::create_inserter(client, "staking_events", &config),
            reward_update_inserter: Self::create_inserter(client, "reward_updates", &config),
            config,
            redpanda_publisher: None,
        }
    }
}

impl ClickhouseClient {
    pub async fn new(
        settings: ClickHouseSettings,
        historical_rx: mpsc::Receiver<IngestMessage>,
        live_rx: mpsc::Receiver<IngestMessage>,
    ) -> anyhow::Result<(Self, BatchIngestor, BatchIngestor)> {
        info!("Connecting to ClickHouse");

        let client = Client::default()
            .with_url(settings.url.clone())
            .with_user(settings.user.clone())
            .with_password(settings.password.clone())
            .with_database(settings.database.clone())
            .with_validation(false);

        // Test connection with retry logic
        let mut retries = 0;
        let max_retries = 3;
        #[allow(unused_assignments)]
        let mut last_error: Option<String> = None;

        loop {
            match client.query("SELECT 1").fetch_one::<u8>().await {
                Ok(_) => {
                    info!("Successfully connected to ClickHouse");
                    break;
                },
                Err(e) => {
                    let error_msg = e.to_string();
                    last_error = Some(error_msg.clone());
                    retries += 1;

                    if retries >= max_retries {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to ClickHouse after {} attempts: {}",
                            max_retries,
                            last_error.unwrap_or_else(|| "Unknown error".to_string())
                        ));
                    }

                    let delay = std::time::Duration::from_millis(100 * 2_u64.pow(retries));
                    log::warn!(
                        "Failed to connect to ClickHouse (attempt {}/{}), retrying in {:?}... Error: {}",
                        retries,
                        max_retries,
                        delay,
                        error_msg
                    );
                    tokio::time::sleep(delay).await;
                },
            }
        }

        // Historical ingestor: high-throughput for chain sync
        // Use byte-based limits for memory-aware batching
        let historical_config = InserterConfig {
            max_rows: settings.historical_batch_size as u64,
            max_bytes: 500_000_000,
            period: Duration::from_secs(settings.historical_max_wait_secs as u64),
        };
        let historical_ingestor =
            BatchIngestor::new("HISTORICAL", &client, historical_rx, historical_config);

        // Live ingestor: low-latency for real-time data
        // Unlimited bytes so time (100ms) or row count drives flushes
        let live_config = InserterConfig {
            max_rows: settings.live_batch_size as u64,
            max_bytes: u64::MAX,
            period: Duration::from_millis(settings.live_max_wait_ms as u64),
        };
        let live_ingestor = BatchIngestor::new("LIVE", &client, live_rx, live_config);

        info!(
            "Created dual ingestors - Historical: {}rows/{}s, Live: {}rows/{}ms",
            settings.historical_batch_size,
            settings.historical_max_wait_secs,
            settings.live_batch_size,
            settings.live_max_wait_ms
        );

        Ok((
            Self {
                client,
            },
            historical_ingestor,
            live_ingestor,
        ))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running ClickHouse migrations");
        let schema = tokio::fs::read_to_string("schema/clickhouse.sql")
            .await
            .context("Failed to read schema/clickhouse.sql")?;

        for statement in schema.split(';') {
            let stmt = statement.trim();
            if stmt.is_empty() {
                continue;
            }
            self.client
                .query(stmt)
                .execute()
                .await
                .with_context(|| format!("Failed to execute migration statement: {}", stmt))?;
        }

        info!("ClickHouse migrations completed successfully");
        Ok(())
    }

    /// Health check - verify connection is still alive
    pub async fn health_check(&self) -> anyhow::Result<()> {
        self.client
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .context("ClickHouse health check failed")?;
        Ok(())
    }
}
