//! Reward ledger client.
//!
//! Talks to an EVM chain node over JSON-RPC to pay out `SensorRewardToken`
//! rewards. The contract session starts unbound and is bound at most once,
//! either from configuration or from a deployment descriptor read after a
//! startup delay. Transactions are signed locally with the admin key and
//! submitted through a single nonce sequencer.

pub mod abi;
pub mod client;
pub mod deployment;
pub mod error;
pub mod outcome;
pub mod rpc;
pub mod sequencer;
pub mod session;
pub mod signer;
pub mod wallets;

pub use client::{LedgerClient, LedgerSettings};
pub use deployment::load_deployment;
pub use error::LedgerError;
pub use outcome::{ContractInfo, RewardAttempt, RewardOutcome, SensorTokenInfo, UnavailableReason};
pub use rpc::{ChainRpc, HttpChainRpc};
pub use sequencer::SubmissionSequencer;
pub use session::{ContractSession, SessionState};
pub use signer::{AdminSigner, LegacyTransaction};
pub use wallets::WalletRegistry;
