//! Chain-facing [`ContractFactory`](crate::ContractFactory) implementations.

pub mod artifacts;
mod rpc_factory;
mod simulated;

pub use artifacts::{Artifact, ArtifactStore};
pub use rpc_factory::{
    DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_RPC_URL, RpcConfig,
    RpcContractFactory,
};
pub use simulated::{CompensationRecord, SIMULATED_SENDER, SimulatedChain, SimulatedContract};
