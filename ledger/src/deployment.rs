//! Deployment descriptor written by the contract deployment tooling.

use std::path::Path;

use serde::Deserialize;
use srt_types::LedgerAddress;

use crate::LedgerError;

#[derive(Debug, Deserialize)]
struct DeploymentDescriptor {
    #[serde(rename = "contractAddress", alias = "ContractAddress", default)]
    contract_address: Option<String>,
}

/// Read the contract address from a descriptor such as
/// `{"contractAddress": "0x…", "network": "localhost"}`.
pub fn load_deployment(path: &Path) -> Result<LedgerAddress, LedgerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LedgerError::Deployment(format!("cannot read {}: {e}", path.display())))?;
    parse_deployment(&content)
}

pub fn parse_deployment(content: &str) -> Result<LedgerAddress, LedgerError> {
    let descriptor: DeploymentDescriptor = serde_json::from_str(content)
        .map_err(|e| LedgerError::Deployment(format!("invalid JSON: {e}")))?;
    let raw = descriptor
        .contract_address
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| LedgerError::Deployment("contract address is empty".into()))?;
    raw.parse()
        .map_err(|source| LedgerError::InvalidAddress {
            context: "deployment contract".into(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    #[test]
    fn camel_and_pascal_case() {
        let camel = format!(r#"{{"contractAddress":"{ADDR}","network":"localhost"}}"#);
        let pascal = format!(r#"{{"ContractAddress":"{ADDR}"}}"#);
        assert_eq!(parse_deployment(&camel).unwrap().to_string(), ADDR);
        assert_eq!(parse_deployment(&pascal).unwrap().to_string(), ADDR);
    }

    #[test]
    fn empty_or_missing_address_is_an_error() {
        assert!(matches!(
            parse_deployment(r#"{"contractAddress":""}"#),
            Err(LedgerError::Deployment(_))
        ));
        assert!(matches!(
            parse_deployment(r#"{"network":"localhost"}"#),
            Err(LedgerError::Deployment(_))
        ));
        assert!(parse_deployment("not json").is_err());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        std::fs::write(&path, format!(r#"{{"contractAddress":"{ADDR}"}}"#)).unwrap();
        assert_eq!(load_deployment(&path).unwrap().to_string(), ADDR);
        assert!(matches!(
            load_deployment(&dir.path().join("missing.json")),
            Err(LedgerError::Deployment(_))
        ));
    }
}
