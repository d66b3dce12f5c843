mod config;

pub use config::{
    ClickHouseSettings, IndexerSettings, NetworkSettings, PostgresSettings, RedpandaSettings,
    Settings,
};
