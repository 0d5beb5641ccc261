//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, U64};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// The fields of a transaction receipt this crate cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `1` on success, `0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }
}

/// Retry schedule for `max_polls` attempts in total. The first attempt is not a retry.
fn receipt_backoff(poll_interval: Duration, max_polls: usize) -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(poll_interval)
        .with_max_times(max_polls.saturating_sub(1))
}

/// Poll `eth_getTransactionReceipt` until the transaction is mined.
///
/// Gives up after `max_polls` attempts spaced `poll_interval` apart.
pub async fn wait_for_receipt(
    client: &reqwest::Client,
    url: &str,
    tx_hash: B256,
    poll_interval: Duration,
    max_polls: usize,
) -> Result<TransactionReceipt, anyhow::Error> {
    let fetch = move || async move {
        let receipt: Option<TransactionReceipt> = json_rpc_call(
            client,
            url,
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await?;

        receipt.with_context(|| format!("Transaction {} is still pending", tx_hash))
    };

    fetch
        .retry(receipt_backoff(poll_interval, max_polls))
        .notify(|e, _| {
            tracing::trace!(error = %e, %tx_hash, "Receipt not available, polling again...");
        })
        .await
        .with_context(|| {
            format!(
                "Timeout waiting for transaction {} to be confirmed after {} polls",
                tx_hash, max_polls
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;

    #[test]
    fn test_receipt_backoff_bounds_total_polls() {
        // Delays between attempts: one fewer than the number of polls.
        assert_eq!(receipt_backoff(Duration::ZERO, 120).build().count(), 119);
        assert_eq!(receipt_backoff(Duration::ZERO, 1).build().count(), 0);
        assert_eq!(receipt_backoff(Duration::ZERO, 0).build().count(), 0);
    }

    #[test]
    fn test_receipt_deserialization() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x1b4",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        assert!(receipt.succeeded());
        assert_eq!(receipt.block_number, Some(U64::from(0x1b4)));
        assert_eq!(
            receipt.contract_address,
            Some(
                "0x5FbDB2315678afecb367f032d93F642f64180aa3"
                    .parse::<Address>()
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_reverted_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x2",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();

        assert!(!receipt.succeeded());
        assert_eq!(receipt.contract_address, None);
    }
}
