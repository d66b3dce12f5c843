pub mod contract_stats;
pub mod daily_rollover;
