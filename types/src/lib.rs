//! Fundamental types for the SRT telemetry node.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! sensor readings, ledger addresses, transaction hashes and fixed-point token
//! amounts. Ledger integers are `ethereum_types::U256`, re-exported here.

pub mod address;
pub mod amount;
pub mod error;
pub mod hash;
pub mod reading;

pub use address::LedgerAddress;
pub use amount::TokenAmount;
pub use error::{AddressError, ParseError};
pub use ethereum_types::U256;
pub use hash::TxHash;
pub use reading::{parse_timestamp, Reading};
