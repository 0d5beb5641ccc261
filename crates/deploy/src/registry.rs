//! Address registry built up during a provisioning run.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{ComponentKey, DeployError};

/// A component that has been confirmed on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedComponent {
    pub key: ComponentKey,
    pub address: Address,
}

/// Insertion-ordered mapping from component key to deployed address.
///
/// Entries are only ever appended: a key is assigned exactly once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressRegistry {
    components: Vec<DeployedComponent>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly deployed component.
    pub fn insert(&mut self, key: ComponentKey, address: Address) -> Result<(), DeployError> {
        if self.contains(&key) {
            return Err(DeployError::DuplicateComponent(key));
        }

        self.components.push(DeployedComponent { key, address });
        Ok(())
    }

    pub fn get(&self, key: &ComponentKey) -> Option<Address> {
        self.components
            .iter()
            .find(|component| &component.key == key)
            .map(|component| component.address)
    }

    /// Like [`AddressRegistry::get`], but a missing key is an ordering bug.
    pub fn resolve(&self, key: &ComponentKey, required_by: &str) -> Result<Address, DeployError> {
        self.get(key)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                dependency: key.clone(),
                required_by: required_by.to_string(),
            })
    }

    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.components.iter().any(|component| &component.key == key)
    }

    /// Components in deployment order.
    pub fn iter(&self) -> impl Iterator<Item = &DeployedComponent> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Contract;

    #[test]
    fn test_insert_and_resolve() {
        let mut registry = AddressRegistry::new();
        let oracle = Address::repeat_byte(0x11);
        registry.insert(Contract::Oracle.key(), oracle).unwrap();

        assert_eq!(registry.get(&Contract::Oracle.key()), Some(oracle));
        assert_eq!(
            registry.resolve(&Contract::Oracle.key(), "test").unwrap(),
            oracle
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut registry = AddressRegistry::new();
        registry
            .insert(Contract::Pool.key(), Address::repeat_byte(0x01))
            .unwrap();

        let err = registry
            .insert(Contract::Pool.key(), Address::repeat_byte(0x02))
            .unwrap_err();

        assert_eq!(err, DeployError::DuplicateComponent(Contract::Pool.key()));
        assert_eq!(
            registry.get(&Contract::Pool.key()),
            Some(Address::repeat_byte(0x01)),
            "first assignment must be kept"
        );
    }

    #[test]
    fn test_instances_are_distinct_keys() {
        let mut registry = AddressRegistry::new();
        registry
            .insert(Contract::MockErc20.instance("USDC"), Address::repeat_byte(0x01))
            .unwrap();
        registry
            .insert(Contract::MockErc20.instance("ETH"), Address::repeat_byte(0x02))
            .unwrap();

        assert!(!registry.contains(&Contract::MockErc20.key()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_missing_key_is_unresolved() {
        let registry = AddressRegistry::new();
        let err = registry
            .resolve(&Contract::Depos.key(), "new Pool")
            .unwrap_err();

        assert_eq!(
            err,
            DeployError::UnresolvedDependency {
                dependency: Contract::Depos.key(),
                required_by: "new Pool".to_string(),
            }
        );
    }

    #[test]
    fn test_iteration_follows_insertion_order() {
        let mut registry = AddressRegistry::new();
        registry
            .insert(Contract::Pool.key(), Address::repeat_byte(0x03))
            .unwrap();
        registry
            .insert(Contract::Oracle.key(), Address::repeat_byte(0x01))
            .unwrap();

        let keys: Vec<_> = registry.iter().map(|c| c.key.to_string()).collect();
        assert_eq!(keys, vec!["Pool", "Oracle"]);
    }
}
