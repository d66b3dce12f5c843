use crate::abis::multicall::{Call3, IMulticall3};
use crate::abis::staking::IStaking;
use crate::db::models::StakingContract;
use crate::Database;
use alloy::providers::MULTICALL3_ADDRESS;
use alloy::{
    providers::{DynProvider, ProviderBuilder},
    sol_types::SolCall,
};
use anyhow::{Context, Result};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Staking-instance parameter reader using multicall3.
///
/// Each new proxy instance is read once at creation for its immutable
/// parameters (max services, rewards rate, deposit bond, agent count,
/// liveness period). A read that reverts leaves the parameter fields None;
/// valuation updates that depend on them are skipped, never guessed.
#[derive(Clone)]
pub struct InstanceReader {
    db: Arc<Database>,
    provider: DynProvider,
    /// Cache of instance addresses whose parameter reads failed.
    /// Prevents hammering the RPC for proxies that will never respond.
    failed_instances: Cache<String, ()>,
}

/// Maximum retries for multicall
const MAX_RETRIES: u32 = 3;

/// Delay between retries (exponential backoff base)
const RETRY_DELAY_MS: u64 = 100;

/// Timeout for individual RPC calls (30 seconds)
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls issued per instance in one multicall
const CALLS_PER_INSTANCE: usize = 5;

impl InstanceReader {
    pub fn new(rpc_url: &str, db: Arc<Database>) -> Result<Self> {
        let url = Url::parse(rpc_url).context("Invalid RPC URL")?;

        let client = ProviderBuilder::new().connect_http(url);
        let provider = DynProvider::new(client);

        // TTL ensures a failed proxy is retried eventually, in case the
        // implementation behind it was fixed
        let failed_instances = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Ok(Self {
            db,
            provider,
            failed_instances,
        })
    }

    /// Batch size for multicall requests to avoid RPC congestion/timeouts
    const MULTICALL_BATCH_SIZE: usize = 20;

    /// Fill in on-chain parameters for newly discovered instances and persist
    /// them. Instances whose reads fail are persisted with None parameters.
    pub async fn register_instances(
        &self,
        mut contracts: Vec<StakingContract>,
    ) -> Result<Vec<StakingContract>> {
        if contracts.is_empty() {
            return Ok(contracts);
        }

        for chunk in contracts.chunks_mut(Self::MULTICALL_BATCH_SIZE) {
            self.read_params_chunk_with_retry(chunk).await;
        }

        let refs: Vec<&StakingContract> = contracts.iter().collect();
        self.db.postgres.set_staking_contracts(&refs).await?;

        Ok(contracts)
    }

    /// Read parameters with retry logic
    async fn read_params_chunk_with_retry(&self, contracts: &mut [StakingContract]) {
        for attempt in 0..MAX_RETRIES {
            match self.read_params_chunk(contracts).await {
                Ok(()) => return,
                Err(_) => {
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        // All retries failed - try individual reads as fallback
        for contract in contracts.iter_mut() {
            if self.failed_instances.contains_key(&contract.address) {
                continue;
            }
            if !self.read_params_single(contract).await {
                self.failed_instances.insert(contract.address.clone(), ()).await;
            }
        }
    }

    /// Fallback: read one instance's parameters with direct calls.
    /// Returns false when nothing could be read.
    async fn read_params_single(&self, contract: &mut StakingContract) -> bool {
        let Ok(address) = contract.address.parse() else {
            return false;
        };

        let instance = IStaking::new(address, &self.provider);

        let deposit =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, instance.minStakingDeposit().call()).await
            {
                Ok(Ok(v)) => Some(v),
                _ => None,
            };
        let agents =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, instance.numAgentInstances().call()).await
            {
                Ok(Ok(v)) => u64::try_from(v).ok(),
                _ => None,
            };
        let max_services =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, instance.maxNumServices().call()).await {
                Ok(Ok(v)) => u64::try_from(v).ok(),
                _ => None,
            };
        let rate =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, instance.rewardsPerSecond().call()).await {
                Ok(Ok(v)) => Some(v),
                _ => None,
            };
        let liveness =
            match tokio::time::timeout(RPC_CALL_TIMEOUT, instance.livenessPeriod().call()).await {
                Ok(Ok(v)) => u64::try_from(v).ok(),
                _ => None,
            };

        contract.min_staking_deposit = deposit;
        contract.num_agent_instances = agents;
        contract.max_num_services = max_services;
        contract.rewards_per_second = rate;
        contract.liveness_period = liveness;

        deposit.is_some()
            || agents.is_some()
            || max_services.is_some()
            || rate.is_some()
            || liveness.is_some()
    }

    async fn read_params_chunk(&self, contracts: &mut [StakingContract]) -> Result<()> {
        let multicall = IMulticall3::new(MULTICALL3_ADDRESS, &self.provider);
        let mut calls = Vec::with_capacity(contracts.len() * CALLS_PER_INSTANCE);

        for contract in contracts.iter() {
            let address = contract.address.parse().context("Invalid instance address")?;
            let instance = IStaking::new(address, &self.provider);

            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: instance.maxNumServices().calldata().to_vec().into(),
            });
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: instance.rewardsPerSecond().calldata().to_vec().into(),
            });
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: instance.minStakingDeposit().calldata().to_vec().into(),
            });
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: instance.numAgentInstances().calldata().to_vec().into(),
            });
            calls.push(Call3 {
                target: address,
                allowFailure: true,
                callData: instance.livenessPeriod().calldata().to_vec().into(),
            });
        }

        let results = tokio::time::timeout(RPC_CALL_TIMEOUT, multicall.aggregate3(calls).call())
            .await
            .context("Multicall timeout")?
            .context("Multicall aggregate3 failed")?;

        for (i, contract) in contracts.iter_mut().enumerate() {
            let base_idx = i * CALLS_PER_INSTANCE;
            if base_idx + CALLS_PER_INSTANCE > results.len() {
                break;
            }

            let max_services_res = &results[base_idx];
            let rate_res = &results[base_idx + 1];
            let deposit_res = &results[base_idx + 2];
            let agents_res = &results[base_idx + 3];
            let liveness_res = &results[base_idx + 4];

            if max_services_res.success {
                contract.max_num_services =
                    IStaking::maxNumServicesCall::abi_decode_returns(&max_services_res.returnData)
                        .ok()
                        .and_then(|v| u64::try_from(v).ok());
            }
            if rate_res.success {
                contract.rewards_per_second =
                    IStaking::rewardsPerSecondCall::abi_decode_returns(&rate_res.returnData).ok();
            }
            if deposit_res.success {
                contract.min_staking_deposit =
                    IStaking::minStakingDepositCall::abi_decode_returns(&deposit_res.returnData)
                        .ok();
            }
            if agents_res.success {
                contract.num_agent_instances =
                    IStaking::numAgentInstancesCall::abi_decode_returns(&agents_res.returnData)
                        .ok()
                        .and_then(|v| u64::try_from(v).ok());
            }
            if liveness_res.success {
                contract.liveness_period =
                    IStaking::livenessPeriodCall::abi_decode_returns(&liveness_res.returnData)
                        .ok()
                        .and_then(|v| u64::try_from(v).ok());
            }
        }

        Ok(())
    }
}
