pub mod factory;
pub mod multicall;
pub mod staking;

pub use factory::InstanceCreated;
pub use multicall::{Call3, IMulticall3, McResult};
pub use staking::{
    Checkpoint, Deposit, IStaking, RewardClaimed, ServiceForceUnstaked, ServiceStaked,
    ServiceUnstaked, ServicesEvicted, Withdraw,
};
