//! Reward outcomes and ledger read models.

use serde::Serialize;
use srt_types::{LedgerAddress, TokenAmount, TxHash};

use crate::LedgerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No wallet is bound to the sensor.
    SensorUnbound,
    /// No contract address is known yet.
    SessionUninitialized,
}

#[derive(Debug)]
pub enum RewardOutcome {
    Rewarded { tx_hash: TxHash },
    Unavailable(UnavailableReason),
    Failed(LedgerError),
}

/// One resolved reward dispatch.
#[derive(Debug)]
pub struct RewardAttempt {
    pub sensor_id: String,
    pub wallet: Option<LedgerAddress>,
    /// Set once the transaction was accepted by the chain node, even if it
    /// later reverted or timed out.
    pub tx_hash: Option<TxHash>,
    pub outcome: RewardOutcome,
}

impl RewardAttempt {
    pub fn unavailable(sensor_id: &str, wallet: Option<LedgerAddress>, reason: UnavailableReason) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            wallet,
            tx_hash: None,
            outcome: RewardOutcome::Unavailable(reason),
        }
    }

    pub fn is_rewarded(&self) -> bool {
        matches!(self.outcome, RewardOutcome::Rewarded { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorTokenInfo {
    pub sensor_id: String,
    pub wallet_address: LedgerAddress,
    pub balance: TokenAmount,
    pub total_rewards: TokenAmount,
    pub message_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub contract_address: LedgerAddress,
    pub admin_address: LedgerAddress,
    pub total_supply: TokenAmount,
    pub reward_per_message: TokenAmount,
    pub admin_balance: TokenAmount,
}
