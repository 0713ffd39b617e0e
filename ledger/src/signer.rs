//! Admin account key and EIP-155 legacy transaction signing.

use std::fmt;

use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use srt_types::{LedgerAddress, TxHash, U256};

use crate::abi::keccak256;
use crate::LedgerError;

/// A legacy (pre-EIP-1559) transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub to: LedgerAddress,
    pub value: U256,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    /// Open a nine-item list and append the six transaction fields.
    fn begin_stream(&self) -> RlpStream {
        let mut stream = RlpStream::new_list(9);
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit)
            .append(&self.to.to_h160())
            .append(&self.value)
            .append(&self.data);
        stream
    }

    /// RLP of `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut stream = self.begin_stream();
        stream.append(&chain_id).append(&0u8).append(&0u8);
        stream.out().to_vec()
    }
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
    pub v: u64,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// The admin account that signs reward transactions.
pub struct AdminSigner {
    key: SigningKey,
    address: LedgerAddress,
}

impl AdminSigner {
    /// Load a secp256k1 private key from hex (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self, LedgerError> {
        let trimmed = private_key.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|_| LedgerError::Config("admin private key is not valid hex".into()))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|_| LedgerError::Config("admin private key is not a valid secp256k1 scalar".into()))?;
        let address = address_of(&key);
        Ok(Self { key, address })
    }

    pub fn address(&self) -> LedgerAddress {
        self.address
    }

    /// Sign with EIP-155 replay protection: `v = chainId * 2 + 35 + recoveryId`.
    pub fn sign(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<SignedTransaction, LedgerError> {
        let sighash = keccak256(&tx.signing_payload(chain_id));
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        let v = chain_id * 2 + 35 + u64::from(recovery_id.to_byte());

        let mut stream = tx.begin_stream();
        stream
            .append(&v)
            .append(&U256::from_big_endian(&r))
            .append(&U256::from_big_endian(&s));
        let raw = stream.out().to_vec();
        let hash = TxHash::new(keccak256(&raw));
        Ok(SignedTransaction { raw, hash, v, r, s })
    }
}

impl fmt::Debug for AdminSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Last 20 bytes of the Keccak-256 of the uncompressed public key.
fn address_of(key: &SigningKey) -> LedgerAddress {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    LedgerAddress::new(bytes)
}
