//! Contract session: unbound until a contract address is known, then bound
//! for the rest of the process lifetime.

use std::sync::OnceLock;

use serde::Serialize;
use srt_types::LedgerAddress;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Uninitialized,
    Initialized,
}

#[derive(Debug, Default)]
pub struct ContractSession {
    contract: OnceLock<LedgerAddress>,
}

impl ContractSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the session to `contract`.
    ///
    /// Returns `false` if the session was already bound; the first binding
    /// always wins.
    pub fn bind(&self, contract: LedgerAddress) -> bool {
        self.contract.set(contract).is_ok()
    }

    pub fn state(&self) -> SessionState {
        if self.contract.get().is_some() {
            SessionState::Initialized
        } else {
            SessionState::Uninitialized
        }
    }

    pub fn contract_address(&self) -> Option<LedgerAddress> {
        self.contract.get().copied()
    }
}
