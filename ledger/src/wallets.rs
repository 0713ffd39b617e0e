//! Static sensor → wallet bindings.

use std::collections::BTreeMap;

use srt_types::LedgerAddress;

use crate::LedgerError;

/// Read-only map from sensor id to the wallet that receives its rewards.
///
/// Built once at startup. A sensor without a binding is normal and simply
/// earns nothing.
#[derive(Clone, Debug, Default)]
pub struct WalletRegistry {
    bindings: BTreeMap<String, LedgerAddress>,
}

impl WalletRegistry {
    pub fn new(bindings: BTreeMap<String, LedgerAddress>) -> Self {
        Self { bindings }
    }

    /// Parse `sensorId → "0x…"` pairs. Any invalid address is an error.
    pub fn from_config(raw: &BTreeMap<String, String>) -> Result<Self, LedgerError> {
        let mut bindings = BTreeMap::new();
        for (sensor_id, address) in raw {
            let parsed = address
                .parse::<LedgerAddress>()
                .map_err(|source| LedgerError::InvalidAddress {
                    context: format!("wallet of sensor {sensor_id}"),
                    source,
                })?;
            bindings.insert(sensor_id.clone(), parsed);
        }
        Ok(Self { bindings })
    }

    pub fn lookup(&self, sensor_id: &str) -> Option<LedgerAddress> {
        self.bindings.get(sensor_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, LedgerAddress)> {
        self.bindings.iter().map(|(id, addr)| (id.as_str(), *addr))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn lookup_bound_and_unbound() {
        let registry = WalletRegistry::from_config(&raw(&[(
            "TEMP-1",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        )]))
        .unwrap();
        assert_eq!(
            registry.lookup("TEMP-1").map(|a| a.to_string()),
            Some("0x70997970c51812dc3a010c7d01b50e0d17dc79c8".to_string())
        );
        assert_eq!(registry.lookup("TEMP-2"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_address_is_rejected() {
        let err = WalletRegistry::from_config(&raw(&[("TEMP-1", "0x1234")])).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress { .. }));
        assert!(err.to_string().contains("TEMP-1"));
    }

    #[test]
    fn iteration_is_ordered_by_sensor_id() {
        let registry = WalletRegistry::from_config(&raw(&[
            ("b", "0x0000000000000000000000000000000000000002"),
            ("a", "0x0000000000000000000000000000000000000001"),
        ]))
        .unwrap();
        let ids: Vec<_> = registry.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
