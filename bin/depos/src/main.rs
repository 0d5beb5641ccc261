//! depos deploys a fresh instance of the Depos protocol and wires it together.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::Cli;
use depos_deploy::{
    AddressRegistry, CONFIG_FILENAME, DeploymentPlan, ProtocolConfig, Provisioner,
    RpcContractFactory, SimulatedChain,
    report::{self, ADDRESSES_FILENAME, AddressBook},
};

/// Prefix of the environment variables that override protocol parameters.
const ENV_PREFIX: &str = "DEPOS_";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = load_protocol_config(cli.config.as_deref())?;
    let plan = DeploymentPlan::protocol(&config)?;

    tracing::info!(
        steps = plan.len(),
        components = plan.components().count(),
        assets = config.assets.len(),
        "Deployment plan built"
    );

    if cli.print_plan {
        for (index, step) in plan.iter().enumerate() {
            println!("{:>3}. [{}] {}", index + 1, step.kind(), step);
        }
        return Ok(());
    }

    let registry = if cli.simulate {
        tracing::info!("Running against a simulated chain");
        Provisioner::new(SimulatedChain::new())
            .run(&plan, AddressRegistry::new())
            .await
            .context("Simulated provisioning failed")?
    } else {
        let factory = RpcContractFactory::connect(cli.rpc_config()).await?;
        Provisioner::new(factory)
            .run(&plan, AddressRegistry::new())
            .await
            .context("Provisioning failed")?
    };

    report::emit(&registry, &mut std::io::stdout())?;

    if let Some(outdata) = &cli.outdata {
        save_outdata(outdata, &config, &registry)?;
    }

    Ok(())
}

/// Layer the built-in defaults, an optional TOML file and `DEPOS_` environment variables.
///
/// Nested keys are separated by a double underscore in the environment, e.g.
/// `DEPOS_DEPOSIT_TOKEN__PRICE`.
fn load_protocol_config(path: Option<&Path>) -> Result<ProtocolConfig> {
    let mut figment = Figment::from(Serialized::defaults(ProtocolConfig::default()));

    if let Some(path) = path {
        let file = config_file(path)?;
        tracing::info!(path = %file.display(), "Loading protocol configuration");
        figment = figment.merge(Toml::file(file));
    }

    let config: ProtocolConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load protocol configuration")?;

    config.validate()?;
    Ok(config)
}

/// Resolve a configuration path, accepting a directory that holds `Depos.toml`.
fn config_file(path: &Path) -> Result<PathBuf> {
    let file = if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    };

    if !file.is_file() {
        anyhow::bail!("Configuration file not found: {}", file.display());
    }

    Ok(file)
}

/// Write the address book and the effective configuration to `outdata`.
fn save_outdata(
    outdata: &Path,
    config: &ProtocolConfig,
    registry: &AddressRegistry,
) -> Result<()> {
    std::fs::create_dir_all(outdata)
        .context(format!("Failed to create output directory {}", outdata.display()))?;

    config.save_to_file(&outdata.join(CONFIG_FILENAME))?;
    AddressBook::new(registry).save_to_file(&outdata.join(ADDRESSES_FILENAME))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_| {
            let config = load_protocol_config(None).unwrap();
            assert_eq!(config, ProtocolConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_numeric_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DEPOS_DEPOSIT_TOKEN__PRICE", 12);
            jail.set_env("DEPOS_PRICE_DECIMALS", 8);

            let config = load_protocol_config(None).unwrap();
            assert_eq!(config.deposit_token.price, "12");
            assert_eq!(config.price_decimals, 8);
            Ok(())
        });
    }

    #[test]
    fn test_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            let mut custom = ProtocolConfig::default();
            custom.assets.truncate(1);
            custom.deposit_token.price = "12.5".to_string();
            custom
                .save_to_file(&jail.directory().join(CONFIG_FILENAME))
                .unwrap();

            // The directory resolves to the Depos.toml inside it.
            let loaded = load_protocol_config(Some(jail.directory())).unwrap();
            assert_eq!(loaded.assets.len(), 1);
            assert_eq!(loaded.deposit_token.price, "12.5");
            Ok(())
        });
    }

    #[test]
    fn test_env_wins_over_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILENAME,
                r#"
                price_decimals = 6

                [deposit_token]
                initial_supply = 500
                decimals = 18
                price = 3

                [[assets]]
                symbol = "DAI"
                decimals = 18
                price = 1
                stablecoin = true

                [assets.compensation]
                threshold_ratio = 0.8
                target_ratio = 0.98
                window_secs = 600
                cooldown = 2
                "#,
            )?;
            jail.set_env("DEPOS_DEPOSIT_TOKEN__PRICE", 4.5);

            let loaded = load_protocol_config(Some(jail.directory())).unwrap();
            assert_eq!(loaded.assets.len(), 1);
            assert_eq!(loaded.assets[0].symbol, "DAI");
            assert_eq!(loaded.assets[0].compensation.target_ratio, "0.98");
            assert_eq!(loaded.deposit_token.initial_supply, "500");
            assert_eq!(loaded.deposit_token.price, "4.5");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new("depos-test").expect("Failed to create temp dir");
        let missing = temp_dir.path().join("missing.toml");

        let err = load_protocol_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_save_outdata() {
        let temp_dir = TempDir::new("depos-test").expect("Failed to create temp dir");
        let outdata = temp_dir.path().join("run");

        let config = ProtocolConfig::default();
        let plan = DeploymentPlan::protocol(&config).unwrap();
        let registry = Provisioner::new(SimulatedChain::new())
            .run(&plan, AddressRegistry::new())
            .await
            .unwrap();

        save_outdata(&outdata, &config, &registry).unwrap();

        let book = AddressBook::load_from_file(&outdata.join(ADDRESSES_FILENAME)).unwrap();
        assert_eq!(book.components.len(), registry.len());
        assert_eq!(ProtocolConfig::load_from_file(&outdata).unwrap(), config);
    }
}
