pub mod abis;
pub mod config;
pub mod cron;
pub mod db;
pub mod pubsub;
pub mod staking;
pub mod utils;
pub mod worker;

pub use config::Settings;
pub use cron::{CronScheduler, CronSettings};
pub use db::Database;
pub use pubsub::RedpandaPublisher;
pub use staking::Ledger;
pub use worker::{InstanceReader, StakingWorker};
