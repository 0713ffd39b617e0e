//! Ledger client: the single owner of the contract session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use srt_types::{LedgerAddress, TokenAmount, TxHash, U256};
use tokio::task::JoinHandle;

use crate::outcome::{ContractInfo, RewardAttempt, RewardOutcome, SensorTokenInfo, UnavailableReason};
use crate::rpc::{expect_str, parse_quantity};
use crate::{
    abi, load_deployment, AdminSigner, ChainRpc, ContractSession, LedgerError, LegacyTransaction,
    SessionState, SubmissionSequencer, WalletRegistry,
};

/// Chain parameters and receipt polling bounds.
#[derive(Clone, Debug)]
pub struct LedgerSettings {
    pub chain_id: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            chain_id: 31337,
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct LedgerClient {
    rpc: Arc<dyn ChainRpc>,
    signer: AdminSigner,
    wallets: WalletRegistry,
    session: ContractSession,
    sequencer: SubmissionSequencer,
    settings: LedgerSettings,
}

impl LedgerClient {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        signer: AdminSigner,
        wallets: WalletRegistry,
        settings: LedgerSettings,
    ) -> Self {
        Self {
            rpc,
            signer,
            wallets,
            session: ContractSession::new(),
            sequencer: SubmissionSequencer::new(),
            settings,
        }
    }

    /// Bind the contract session. Only the first call has any effect.
    pub fn bind_contract(&self, contract: LedgerAddress) -> bool {
        let bound = self.session.bind(contract);
        if bound {
            tracing::info!(contract = %contract, "contract session initialized");
        } else {
            tracing::warn!(contract = %contract, "contract session already bound, ignoring");
        }
        bound
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn contract_address(&self) -> Option<LedgerAddress> {
        self.session.contract_address()
    }

    pub fn admin_address(&self) -> LedgerAddress {
        self.signer.address()
    }

    pub fn wallets(&self) -> &WalletRegistry {
        &self.wallets
    }

    /// Try once to bind the session from a deployment descriptor.
    ///
    /// A missing or invalid descriptor leaves the session uninitialized.
    pub fn load_deployment_once(&self, path: &Path) -> bool {
        if self.session.state() == SessionState::Initialized {
            return true;
        }
        match load_deployment(path) {
            Ok(contract) => self.bind_contract(contract),
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "failed to load deployment descriptor; ledger features unavailable"
                );
                false
            }
        }
    }

    /// After `delay`, read the deployment descriptor exactly once.
    pub fn spawn_deployment_watch(self: &Arc<Self>, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            client.load_deployment_once(&path);
        })
    }

    // ── Rewards ────────────────────────────────────────────────────────

    /// Pay the reward for one accepted reading. Never fails; the outcome
    /// carries any error.
    pub async fn reward_sensor(&self, sensor_id: &str) -> RewardAttempt {
        let wallet = self.wallets.lookup(sensor_id);
        let Some(contract) = self.session.contract_address() else {
            return RewardAttempt::unavailable(sensor_id, wallet, UnavailableReason::SessionUninitialized);
        };
        let Some(wallet) = wallet else {
            return RewardAttempt::unavailable(sensor_id, None, UnavailableReason::SensorUnbound);
        };

        let data = abi::encode_reward_sensor(&wallet, sensor_id);
        let (tx_hash, outcome) = match self.submit(contract, data).await {
            Err(e) => (None, RewardOutcome::Failed(e)),
            Ok(tx_hash) => match self.wait_for_receipt(tx_hash).await {
                Ok(()) => (Some(tx_hash), RewardOutcome::Rewarded { tx_hash }),
                Err(e) => (Some(tx_hash), RewardOutcome::Failed(e)),
            },
        };
        RewardAttempt {
            sensor_id: sensor_id.to_string(),
            wallet: Some(wallet),
            tx_hash,
            outcome,
        }
    }

    /// Estimate, then sign and send under the sequencer.
    async fn submit(&self, contract: LedgerAddress, data: Vec<u8>) -> Result<TxHash, LedgerError> {
        let gas_limit = self.estimate_gas(contract, &data).await?;

        let slot = self.sequencer.acquire().await;
        let nonce = match slot.cached() {
            Some(nonce) => nonce,
            None => self.pending_nonce().await?,
        };
        match self.sign_and_send(nonce, gas_limit, contract, data).await {
            Ok(tx_hash) => {
                slot.commit(nonce);
                tracing::debug!(nonce, tx_hash = %tx_hash, "reward transaction submitted");
                Ok(tx_hash)
            }
            Err(e) => {
                slot.reset();
                Err(e)
            }
        }
    }

    async fn estimate_gas(&self, contract: LedgerAddress, data: &[u8]) -> Result<U256, LedgerError> {
        let params = json!([{
            "from": self.signer.address().to_string(),
            "to": contract.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        self.quantity("eth_estimateGas", params)
            .await
            .map_err(|e| LedgerError::GasEstimation(e.to_string()))
    }

    async fn pending_nonce(&self) -> Result<u64, LedgerError> {
        let params = json!([self.signer.address().to_string(), "pending"]);
        let count = self.quantity("eth_getTransactionCount", params).await?;
        narrow_u64(count).ok_or_else(|| LedgerError::Rpc {
            code: 0,
            message: format!("transaction count {count} out of range"),
        })
    }

    async fn sign_and_send(
        &self,
        nonce: u64,
        gas_limit: U256,
        contract: LedgerAddress,
        data: Vec<u8>,
    ) -> Result<TxHash, LedgerError> {
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: contract,
            value: U256::zero(),
            data,
        };
        let signed = self.signer.sign(&tx, self.settings.chain_id)?;
        let result = self
            .rpc
            .request("eth_sendRawTransaction", json!([signed.raw_hex()]))
            .await?;
        expect_str(&result, "eth_sendRawTransaction")?
            .parse::<TxHash>()
            .map_err(|e| LedgerError::Rpc {
                code: 0,
                message: format!("invalid transaction hash: {e}"),
            })
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<(), LedgerError> {
        let timeout = self.settings.receipt_timeout;
        match tokio::time::timeout(timeout, self.poll_receipt(tx_hash)).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::ReceiptTimeout {
                tx_hash,
                waited: timeout,
            }),
        }
    }

    async fn poll_receipt(&self, tx_hash: TxHash) -> Result<(), LedgerError> {
        loop {
            let receipt = self
                .rpc
                .request("eth_getTransactionReceipt", json!([tx_hash.to_string()]))
                .await?;
            if !receipt.is_null() {
                let status = receipt
                    .get("status")
                    .and_then(Value::as_str)
                    .and_then(parse_quantity);
                return if status == Some(U256::one()) {
                    Ok(())
                } else {
                    Err(LedgerError::Reverted { tx_hash })
                };
            }
            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// On-chain balance, lifetime rewards and message count of a sensor's wallet.
    pub async fn get_stats(&self, sensor_id: &str) -> Option<SensorTokenInfo> {
        let contract = self.session.contract_address()?;
        let wallet = self.wallets.lookup(sensor_id)?;
        match self.read_sensor_stats(contract, sensor_id, wallet).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(sensor_id, error = %e, "failed to read sensor stats");
                None
            }
        }
    }

    /// Stats for every bound sensor; sensors whose read fails are skipped.
    pub async fn all_sensor_stats(&self) -> Vec<SensorTokenInfo> {
        if self.session.state() == SessionState::Uninitialized {
            return Vec::new();
        }
        let mut stats = Vec::with_capacity(self.wallets.len());
        for (sensor_id, _) in self.wallets.iter() {
            if let Some(info) = self.get_stats(sensor_id).await {
                stats.push(info);
            }
        }
        stats
    }

    pub async fn get_contract_info(&self) -> Option<ContractInfo> {
        let contract = self.session.contract_address()?;
        match self.read_contract_info(contract).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read contract info");
                None
            }
        }
    }

    async fn read_sensor_stats(
        &self,
        contract: LedgerAddress,
        sensor_id: &str,
        wallet: LedgerAddress,
    ) -> Result<SensorTokenInfo, LedgerError> {
        let data = abi::encode_address_call(abi::GET_SENSOR_STATS, &wallet);
        let ret = self.call(contract, &data).await?;
        let values = abi::decode_uints(&ret, 3)?;
        let message_count = narrow_u64(values[2])
            .ok_or_else(|| LedgerError::Abi("message count out of range".into()))?;
        Ok(SensorTokenInfo {
            sensor_id: sensor_id.to_string(),
            wallet_address: wallet,
            balance: TokenAmount::from_base_units(values[0]),
            total_rewards: TokenAmount::from_base_units(values[1]),
            message_count,
        })
    }

    async fn read_contract_info(&self, contract: LedgerAddress) -> Result<ContractInfo, LedgerError> {
        let admin = self.signer.address();
        let total_supply = self.call_uint(contract, &abi::encode_call(abi::TOTAL_SUPPLY)).await?;
        let reward_per_message = self
            .call_uint(contract, &abi::encode_call(abi::REWARD_PER_MESSAGE))
            .await?;
        let admin_balance = self
            .call_uint(contract, &abi::encode_address_call(abi::BALANCE_OF, &admin))
            .await?;
        Ok(ContractInfo {
            contract_address: contract,
            admin_address: admin,
            total_supply: TokenAmount::from_base_units(total_supply),
            reward_per_message: TokenAmount::from_base_units(reward_per_message),
            admin_balance: TokenAmount::from_base_units(admin_balance),
        })
    }

    // ── RPC helpers ────────────────────────────────────────────────────

    async fn call(&self, contract: LedgerAddress, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let params = json!([
            {
                "to": contract.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);
        let result = self.rpc.request("eth_call", params).await?;
        abi::decode_hex_data(expect_str(&result, "eth_call")?)
    }

    async fn call_uint(&self, contract: LedgerAddress, data: &[u8]) -> Result<U256, LedgerError> {
        let ret = self.call(contract, data).await?;
        Ok(abi::decode_uints(&ret, 1)?[0])
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256, LedgerError> {
        let result = self.rpc.request(method, params).await?;
        let raw = expect_str(&result, method)?;
        parse_quantity(raw).ok_or_else(|| LedgerError::Rpc {
            code: 0,
            message: format!("{method}: invalid quantity {raw}"),
        })
    }
}

fn narrow_u64(value: U256) -> Option<u64> {
    (value.bits() <= 64).then(|| value.low_u64())
}
