use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::Parser;
use depos_deploy::{
    RpcConfig,
    chain::{DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_RPC_URL},
};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "depos")]
#[command(
    author,
    version,
    about = "Deploy and wire a fresh instance of the Depos protocol"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "DEPOS_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The URL of the JSON-RPC endpoint to deploy to.
    #[arg(long, alias = "rpc", env = "DEPOS_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: Url,

    /// Directory holding the compiled contract artifacts (`<Name>.json`).
    ///
    /// Searched recursively, so a Hardhat `artifacts/` directory works as is.
    #[arg(long, env = "DEPOS_ARTIFACTS", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// The account to send transactions from. It must be unlocked on the node.
    ///
    /// If not provided, the node's first account is used.
    #[arg(long, env = "DEPOS_FROM")]
    pub from: Option<Address>,

    /// Path to a Depos.toml protocol configuration, or a directory containing one.
    ///
    /// If not provided, the built-in defaults (USDC and ETH) are used.
    #[arg(long, alias = "conf", env = "DEPOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory where the address book and the effective configuration are written.
    #[arg(long, env = "DEPOS_OUTDATA")]
    pub outdata: Option<PathBuf>,

    /// How long to wait for each transaction to be mined, in seconds.
    #[arg(
        long,
        env = "DEPOS_CONFIRMATION_TIMEOUT",
        default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS
    )]
    pub confirmation_timeout: u64,

    /// Run the plan against an in-memory chain instead of a node.
    #[arg(long, env = "DEPOS_SIMULATE")]
    pub simulate: bool,

    /// Print the deployment plan and exit without submitting anything.
    #[arg(long)]
    pub print_plan: bool,
}

impl Cli {
    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            rpc_url: self.rpc_url.clone(),
            artifacts: self.artifacts.clone(),
            sender: self.from,
            confirmation_timeout_secs: self.confirmation_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["depos"]);
        let config = cli.rpc_config();

        assert_eq!(config, RpcConfig::default());
        assert!(!cli.simulate);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_sender_override() {
        let cli = Cli::parse_from([
            "depos",
            "--from",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "--confirmation-timeout",
            "30",
        ]);
        let config = cli.rpc_config();

        assert_eq!(
            config.sender,
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8".parse().unwrap())
        );
        assert_eq!(config.confirmation_timeout_secs, 30);
    }
}
