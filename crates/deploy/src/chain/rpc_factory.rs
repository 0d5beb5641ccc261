//! [`ContractFactory`] backed by a JSON-RPC node with an unlocked sender account.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use super::artifacts::ArtifactStore;
use crate::{
    Confirmation, ContractFactory, DeployError,
    rpc::{self, TransactionReceipt},
};

/// Default JSON-RPC endpoint (a local Hardhat or Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
/// Default artifacts directory (Hardhat layout).
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
/// Default time to wait for a transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 120;

/// Connection settings for [`RpcContractFactory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint of the target node.
    pub rpc_url: Url,
    /// Directory holding compiled `<Name>.json` artifacts.
    pub artifacts: PathBuf,
    /// Account transactions are sent from. Must be unlocked on the node.
    /// Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    /// How long to wait for each transaction to be mined.
    pub confirmation_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            artifacts: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            sender: None,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        }
    }
}

/// Deploys and calls contracts through `eth_sendTransaction`.
pub struct RpcContractFactory {
    client: reqwest::Client,
    rpc_url: Url,
    sender: Address,
    artifacts: ArtifactStore,
    /// Artifact name of every contract this factory deployed, for call encoding.
    deployed: HashMap<Address, String>,
    poll_interval: Duration,
    max_polls: usize,
}

impl RpcContractFactory {
    /// Connect to the node and resolve the sender account.
    pub async fn connect(config: RpcConfig) -> anyhow::Result<Self> {
        let client = rpc::create_client()?;

        let chain_id: String =
            rpc::json_rpc_call(&client, config.rpc_url.as_str(), "eth_chainId", vec![])
                .await
                .with_context(|| format!("Failed to reach RPC endpoint {}", config.rpc_url))?;

        let sender = match config.sender {
            Some(sender) => sender,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&client, config.rpc_url.as_str(), "eth_accounts", vec![])
                        .await
                        .context("Failed to list node accounts")?;
                accounts
                    .into_iter()
                    .next()
                    .context("Node exposes no unlocked accounts; pass a sender explicitly")?
            }
        };

        let poll_interval = rpc::DEFAULT_POLL_INTERVAL;
        let max_polls = (Duration::from_secs(config.confirmation_timeout_secs).as_millis()
            / poll_interval.as_millis().max(1))
        .max(1) as usize;

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = %chain_id,
            %sender,
            artifacts = %config.artifacts.display(),
            "Connected to chain"
        );

        Ok(Self {
            client,
            rpc_url: config.rpc_url,
            sender,
            artifacts: ArtifactStore::new(config.artifacts),
            deployed: HashMap::new(),
            poll_interval,
            max_polls,
        })
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Send a transaction and wait until it is mined successfully.
    async fn submit(
        &self,
        operation: &str,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<TransactionReceipt, DeployError> {
        let mut tx = serde_json::json!({
            "from": self.sender,
            "data": data,
        });
        if let Some(to) = to {
            tx["to"] = serde_json::json!(to);
        }

        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            self.rpc_url.as_str(),
            "eth_sendTransaction",
            vec![tx],
        )
        .await
        .map_err(|e| DeployError::rejected(operation, format!("{:#}", e)))?;

        tracing::debug!(operation, %tx_hash, "Transaction sent, waiting for receipt");

        let receipt = rpc::wait_for_receipt(
            &self.client,
            self.rpc_url.as_str(),
            tx_hash,
            self.poll_interval,
            self.max_polls,
        )
        .await
        .map_err(|e| DeployError::rejected(operation, format!("{:#}", e)))?;

        if !receipt.succeeded() {
            return Err(DeployError::rejected(
                operation,
                format!("transaction {} reverted", tx_hash),
            ));
        }

        Ok(receipt)
    }
}

fn invalid_artifact(component: &str, e: anyhow::Error) -> DeployError {
    DeployError::InvalidArtifact {
        component: component.to_string(),
        reason: format!("{:#}", e),
    }
}

impl ContractFactory for RpcContractFactory {
    async fn instantiate(
        &mut self,
        component: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Address, DeployError> {
        let code = self
            .artifacts
            .get(component)
            .and_then(|artifact| artifact.deploy_code(&args))
            .map_err(|e| invalid_artifact(component, e))?;

        let operation = format!("deploy {}", component);
        let receipt = self.submit(&operation, None, code).await?;

        let address = receipt.contract_address.ok_or_else(|| {
            DeployError::rejected(
                &operation,
                format!(
                    "receipt for {} carries no contract address",
                    receipt.transaction_hash
                ),
            )
        })?;

        self.deployed.insert(address, component.to_string());
        Ok(address)
    }

    async fn call(
        &mut self,
        address: Address,
        operation: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Confirmation, DeployError> {
        let component = self.deployed.get(&address).cloned().ok_or_else(|| {
            DeployError::rejected(
                operation,
                format!("{} was not deployed by this run, its ABI is unknown", address),
            )
        })?;

        let data = self
            .artifacts
            .get(&component)
            .and_then(|artifact| artifact.encode_call(operation, &args))
            .map_err(|e| invalid_artifact(&component, e))?;

        let receipt = self
            .submit(&format!("{}.{}", component, operation), Some(address), data)
            .await?;

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.to::<u64>()),
        })
    }
}
