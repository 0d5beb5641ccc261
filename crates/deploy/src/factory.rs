//! Boundary to the chain client.

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256},
};

use crate::DeployError;

/// Receipt of a confirmed state-changing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Instantiates contracts and calls into them, one confirmed operation at a time.
///
/// Both operations take `&mut self`: a factory owns a single signer whose nonce
/// cannot be shared between in-flight transactions.
pub trait ContractFactory: Send {
    /// Deploy a new instance of `component` and wait for its address.
    fn instantiate(
        &mut self,
        component: &str,
        args: Vec<DynSolValue>,
    ) -> impl Future<Output = Result<Address, DeployError>> + Send;

    /// Call `operation` on a deployed contract and wait for confirmation.
    fn call(
        &mut self,
        address: Address,
        operation: &str,
        args: Vec<DynSolValue>,
    ) -> impl Future<Output = Result<Confirmation, DeployError>> + Send;
}
