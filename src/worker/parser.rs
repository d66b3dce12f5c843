//! Log parsing module for HyperSync logs.
//!
//! Pre-parses blockchain logs into typed structures to avoid redundant parsing
//! in multiple processing passes.

use alloy::{
    primitives::{LogData, B256, U256},
    sol_types::SolEvent,
};
use rustc_hash::FxHashMap;

use crate::{
    abis::{factory, staking},
    utils::hex_encode,
};

/// Pre-parsed log data to avoid re-parsing in multiple passes.
/// Contains all extracted metadata needed for processing.
pub enum ParsedLog {
    /// Factory deployed a new staking proxy instance
    InstanceCreated {
        event: factory::InstanceCreated,
        /// Address the log was emitted from, checked against the configured factory
        factory: String,
        block_number: u64,
        tx_hash: String,
        block_timestamp: u64,
    },
    Staked {
        event: staking::ServiceStaked,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    Unstaked {
        event: staking::ServiceUnstaked,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    ForceUnstaked {
        event: staking::ServiceForceUnstaked,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    Evicted {
        event: staking::ServicesEvicted,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    Checkpoint {
        event: staking::Checkpoint,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    Claimed {
        event: staking::RewardClaimed,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    // Contract-level treasury events, recorded in the event stream only
    Deposit {
        event: staking::Deposit,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
    Withdraw {
        event: staking::Withdraw,
        contract: String,
        block_number: u64,
        log_index: u32,
        tx_hash: String,
        block_timestamp: u64,
    },
}

/// Result of parsing logs from a HyperSync response.
pub struct ParseResult {
    /// Pre-parsed logs in sequential order
    pub parsed_logs: Vec<ParsedLog>,
    /// (contract, epoch) membership keys touched by this batch
    pub membership_keys: Vec<(String, u64)>,
    /// (service, contract, epoch) reward history keys touched by this batch
    pub history_keys: Vec<(u64, String, u64)>,
}

/// Convert a U256 event field that is semantically a small integer (epoch,
/// service id). Values beyond u64 are chain garbage; the caller skips them.
pub fn as_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Parse HyperSync logs into typed structures.
///
/// This function:
/// 1. Extracts all logs from the response
/// 2. Decodes each log based on its topic0 signature
/// 3. Collects the membership and reward-history keys the batch touches
/// 4. Returns parsed logs in sequential order (critical for correct processing)
pub fn parse_logs(
    logs: impl Iterator<Item = hypersync_client::simple_types::Log>,
    block_timestamps: &FxHashMap<u64, u64>,
    log_count_estimate: usize,
) -> ParseResult {
    let mut parsed_logs: Vec<ParsedLog> = Vec::with_capacity(log_count_estimate);
    let mut membership_keys: Vec<(String, u64)> = Vec::with_capacity(log_count_estimate);
    let mut history_keys: Vec<(u64, String, u64)> = Vec::with_capacity(log_count_estimate);

    for log in logs {
        // Ignore logs without topics
        if log.topics.is_empty() {
            continue;
        }

        // Parse the log data as raw bytes
        let data = log
            .data
            .as_ref()
            .map(|d| d.as_ref().to_vec())
            .unwrap_or_default()
            .into();

        // Parse the log topics as alloy B256
        let topics: Vec<B256> = log
            .topics
            .iter()
            .flatten()
            .map(|t| B256::from_slice(t.as_ref()))
            .collect();

        let log_data = LogData::new_unchecked(topics, data);
        let Some(topic0) = log_data.topics().first() else {
            continue;
        };

        let tx_hash = log
            .transaction_hash
            .as_ref()
            .map(|h| hex_encode(h.as_ref()))
            .unwrap_or_default();

        let block_number: u64 = log.block_number.map(|x| x.into()).unwrap_or(0);
        let block_timestamp = block_timestamps.get(&block_number).copied().unwrap_or(0);

        let log_index = log
            .log_index
            .map(|i| {
                let v: u64 = i.into();
                v as u32
            })
            .unwrap_or(0);

        let log_address = log
            .address
            .as_ref()
            .map(|a| hex_encode(a.as_ref()).to_lowercase())
            .unwrap_or_default();

        match topic0 {
            t if t == &factory::InstanceCreated::SIGNATURE_HASH.0 => {
                if let Ok(event) = factory::InstanceCreated::decode_log_data(&log_data) {
                    parsed_logs.push(ParsedLog::InstanceCreated {
                        event,
                        factory: log_address,
                        block_number,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::ServiceStaked::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::ServiceStaked::decode_log_data(&log_data) {
                    if let (Some(epoch), Some(service_id)) =
                        (as_u64(event.epoch), as_u64(event.serviceId))
                    {
                        membership_keys.push((log_address.clone(), epoch));
                        history_keys.push((service_id, log_address.clone(), epoch));
                    }
                    parsed_logs.push(ParsedLog::Staked {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::ServiceUnstaked::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::ServiceUnstaked::decode_log_data(&log_data) {
                    if let Some(epoch) = as_u64(event.epoch) {
                        membership_keys.push((log_address.clone(), epoch));
                    }
                    parsed_logs.push(ParsedLog::Unstaked {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::ServiceForceUnstaked::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::ServiceForceUnstaked::decode_log_data(&log_data) {
                    if let Some(epoch) = as_u64(event.epoch) {
                        membership_keys.push((log_address.clone(), epoch));
                    }
                    parsed_logs.push(ParsedLog::ForceUnstaked {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::ServicesEvicted::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::ServicesEvicted::decode_log_data(&log_data) {
                    if let Some(epoch) = as_u64(event.epoch) {
                        membership_keys.push((log_address.clone(), epoch));
                    }
                    parsed_logs.push(ParsedLog::Evicted {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::Checkpoint::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::Checkpoint::decode_log_data(&log_data) {
                    if let Some(epoch) = as_u64(event.epoch) {
                        // Roll-forward unions into epoch + 1, so prefetch both
                        membership_keys.push((log_address.clone(), epoch));
                        membership_keys.push((log_address.clone(), epoch + 1));
                        for id in &event.serviceIds {
                            if let Some(service_id) = as_u64(*id) {
                                history_keys.push((service_id, log_address.clone(), epoch));
                            }
                        }
                    }
                    parsed_logs.push(ParsedLog::Checkpoint {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::RewardClaimed::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::RewardClaimed::decode_log_data(&log_data) {
                    parsed_logs.push(ParsedLog::Claimed {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::Deposit::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::Deposit::decode_log_data(&log_data) {
                    parsed_logs.push(ParsedLog::Deposit {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            t if t == &staking::Withdraw::SIGNATURE_HASH.0 => {
                if let Ok(event) = staking::Withdraw::decode_log_data(&log_data) {
                    parsed_logs.push(ParsedLog::Withdraw {
                        event,
                        contract: log_address,
                        block_number,
                        log_index,
                        tx_hash,
                        block_timestamp,
                    });
                }
            },
            _ => {},
        }
    }

    ParseResult {
        parsed_logs,
        membership_keys,
        history_keys,
    }
}
