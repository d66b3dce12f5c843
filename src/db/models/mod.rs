pub mod checkpoint;
pub mod daily_snapshot;
pub mod global;
pub mod membership;
pub mod reward_history;
pub mod reward_update;
pub mod service;
pub mod staking_contract;
pub mod staking_event;

pub use checkpoint::SyncCheckpoint;
pub use daily_snapshot::DailySnapshot;
pub use global::StakingGlobal;
pub use membership::EpochMembership;
pub use reward_history::RewardHistory;
pub use reward_update::RewardUpdate;
pub use service::Service;
pub use staking_contract::StakingContract;
pub use staking_event::StakingEvent;
