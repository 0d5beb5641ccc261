//! In-memory chain used for dry runs and tests.

use std::collections::HashMap;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256, keccak256},
};

use crate::{Confirmation, ContractFactory, DeployError};

/// Address the simulated signer deploys from.
pub const SIMULATED_SENDER: Address = Address::new([
    0xf3, 0x9f, 0xd6, 0xe5, 0x1a, 0xad, 0x88, 0xf6, 0xf4, 0xce, 0x6a, 0xb8, 0x82, 0x72, 0x79, 0xcf,
    0xff, 0xb9, 0x22, 0x66,
]);

/// A contract living on the simulated chain.
#[derive(Debug, Clone)]
pub struct SimulatedContract {
    pub component: String,
    pub constructor_args: Vec<DynSolValue>,
    /// Every confirmed call, in order.
    pub calls: Vec<(String, Vec<DynSolValue>)>,
}

/// Compensation parameters as stored by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensationRecord {
    pub threshold_ratio: U256,
    pub target_ratio: U256,
    pub window_secs: U256,
    pub cooldown: U256,
}

/// A [`ContractFactory`] that confirms everything instantly, in memory.
///
/// Addresses follow the CREATE scheme from a fixed sender, so a given plan always
/// yields the same addresses. Any operation can be made to fail with
/// [`SimulatedChain::reject_operation`].
#[derive(Debug, Default)]
pub struct SimulatedChain {
    nonce: u64,
    submitted: usize,
    contracts: HashMap<Address, SimulatedContract>,
    rejections: HashMap<usize, String>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`-th submitted operation (1-based, deployments and calls alike).
    pub fn reject_operation(mut self, n: usize, reason: impl Into<String>) -> Self {
        self.rejections.insert(n, reason.into());
        self
    }

    /// Number of operations submitted so far, including rejected ones.
    pub fn operations_submitted(&self) -> usize {
        self.submitted
    }

    /// Number of operations that took effect.
    pub fn operations_confirmed(&self) -> u64 {
        self.nonce
    }

    pub fn contract(&self, address: Address) -> Option<&SimulatedContract> {
        self.contracts.get(&address)
    }

    /// Arguments of every confirmed `operation` call on `address`, in order.
    pub fn calls(&self, address: Address, operation: &str) -> Vec<Vec<DynSolValue>> {
        self.contracts
            .get(&address)
            .map(|contract| {
                contract
                    .calls
                    .iter()
                    .filter(|(name, _)| name == operation)
                    .map(|(_, args)| args.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Latest `operation` call on `address` whose first argument is `subject`.
    fn latest_keyed(
        &self,
        address: Address,
        operation: &str,
        subject: Address,
    ) -> Option<Vec<DynSolValue>> {
        self.calls(address, operation)
            .into_iter()
            .rev()
            .find(|args| args.first() == Some(&DynSolValue::Address(subject)))
    }

    /// Price the oracle at `oracle` holds for `asset`.
    pub fn price(&self, oracle: Address, asset: Address) -> Option<U256> {
        self.latest_keyed(oracle, "setPrice", asset)
            .and_then(|args| uint(args.get(1)?))
    }

    /// Assets the oracle at `oracle` has a price for.
    pub fn priced_assets(&self, oracle: Address) -> Vec<Address> {
        let mut assets = Vec::new();
        for args in self.calls(oracle, "setPrice") {
            if let Some(DynSolValue::Address(asset)) = args.first() {
                if !assets.contains(asset) {
                    assets.push(*asset);
                }
            }
        }
        assets
    }

    /// AMOs registered with the manager at `manager`, in registration order.
    pub fn amos(&self, manager: Address) -> Vec<Address> {
        self.calls(manager, "AddAMO")
            .into_iter()
            .filter_map(|args| match args.first() {
                Some(DynSolValue::Address(amo)) => Some(*amo),
                _ => None,
            })
            .collect()
    }

    /// Compensation parameters the pool at `pool` holds for `asset`.
    pub fn compensation_parameters(
        &self,
        pool: Address,
        asset: Address,
    ) -> Option<CompensationRecord> {
        let args = self.latest_keyed(pool, "setCompensateParameters", asset)?;
        Some(CompensationRecord {
            threshold_ratio: uint(args.get(1)?)?,
            target_ratio: uint(args.get(2)?)?,
            window_secs: uint(args.get(3)?)?,
            cooldown: uint(args.get(4)?)?,
        })
    }

    fn submit(&mut self, operation: &str) -> Result<B256, DeployError> {
        self.submitted += 1;

        if let Some(reason) = self.rejections.get(&self.submitted) {
            tracing::debug!(operation, index = self.submitted, "Simulated rejection");
            return Err(DeployError::rejected(operation, reason));
        }

        let tx_hash =
            keccak256([SIMULATED_SENDER.as_slice(), &self.nonce.to_be_bytes()[..]].concat());
        self.nonce += 1;
        Ok(tx_hash)
    }
}

fn uint(value: &DynSolValue) -> Option<U256> {
    match value {
        DynSolValue::Uint(value, _) => Some(*value),
        _ => None,
    }
}

impl ContractFactory for SimulatedChain {
    async fn instantiate(
        &mut self,
        component: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Address, DeployError> {
        let address = SIMULATED_SENDER.create(self.nonce);
        self.submit(&format!("deploy {}", component))?;

        self.contracts.insert(
            address,
            SimulatedContract {
                component: component.to_string(),
                constructor_args: args,
                calls: Vec::new(),
            },
        );

        Ok(address)
    }

    async fn call(
        &mut self,
        address: Address,
        operation: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Confirmation, DeployError> {
        if !self.contracts.contains_key(&address) {
            self.submitted += 1;
            return Err(DeployError::rejected(
                operation,
                format!("no contract deployed at {}", address),
            ));
        }

        let block_number = self.nonce + 1;
        let tx_hash = self.submit(operation)?;

        if let Some(contract) = self.contracts.get_mut(&address) {
            contract.calls.push((operation.to_string(), args));
        }

        Ok(Confirmation {
            tx_hash,
            block_number: Some(block_number),
        })
    }
}
