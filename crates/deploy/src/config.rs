//! Protocol parameters seeded into a fresh deployment.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{CompensationParameters, FixedPoint};

/// The default name for the protocol configuration file.
pub const CONFIG_FILENAME: &str = "Depos.toml";

/// Number of fractional digits used for oracle prices and pool ratios.
pub const DEFAULT_PRICE_DECIMALS: u8 = 6;

/// A decimal written either as a string (`"0.95"`) or as a bare number (`0.95`).
#[derive(Deserialize)]
#[serde(untagged)]
enum Decimal {
    Str(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

/// Accept numeric amounts from TOML files and environment overrides, keeping
/// the decimal string form used everywhere else.
fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Decimal::deserialize(deserializer)? {
        Decimal::Str(value) => value,
        Decimal::Unsigned(value) => value.to_string(),
        Decimal::Signed(value) => value.to_string(),
        Decimal::Float(value) => value.to_string(),
    })
}

/// Compensation parameters as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// Collateral ratio below which the pool compensates, e.g. `"0.8"`.
    #[serde(deserialize_with = "decimal")]
    pub threshold_ratio: String,
    /// Ratio the pool restores, e.g. `"0.95"`.
    #[serde(deserialize_with = "decimal")]
    pub target_ratio: String,
    /// Observation window in seconds.
    pub window_secs: u64,
    /// Number of cooldown periods between compensations.
    pub cooldown: u64,
}

/// A base asset: a mock ERC-20 token with its own AMO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Token symbol, also used as its name and as the registry instance key.
    pub symbol: String,
    /// Token decimals.
    pub decimals: u8,
    /// Initial oracle price, e.g. `"2000"`.
    #[serde(deserialize_with = "decimal")]
    pub price: String,
    /// Whether the insurance vault accepts this asset as a stablecoin.
    #[serde(default)]
    pub stablecoin: bool,
    pub compensation: CompensationConfig,
}

/// The protocol's own deposit token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTokenConfig {
    /// Initial supply in whole tokens.
    #[serde(deserialize_with = "decimal")]
    pub initial_supply: String,
    pub decimals: u8,
    /// Initial oracle price.
    #[serde(deserialize_with = "decimal")]
    pub price: String,
}

/// Everything needed to build the deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Fractional digits of prices and ratios.
    pub price_decimals: u8,
    pub deposit_token: DepositTokenConfig,
    /// Base assets, in deployment order.
    pub assets: Vec<AssetConfig>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            price_decimals: DEFAULT_PRICE_DECIMALS,
            deposit_token: DepositTokenConfig {
                initial_supply: "1000000".to_string(),
                decimals: 18,
                price: "10".to_string(),
            },
            assets: vec![
                AssetConfig {
                    symbol: "USDC".to_string(),
                    decimals: 18,
                    price: "1".to_string(),
                    stablecoin: true,
                    compensation: CompensationConfig {
                        threshold_ratio: "0.8".to_string(),
                        target_ratio: "0.99".to_string(),
                        window_secs: 3600,
                        cooldown: 1,
                    },
                },
                AssetConfig {
                    symbol: "ETH".to_string(),
                    decimals: 18,
                    price: "2000".to_string(),
                    stablecoin: false,
                    compensation: CompensationConfig {
                        threshold_ratio: "0.8".to_string(),
                        target_ratio: "0.95".to_string(),
                        window_secs: 3600,
                        cooldown: 1,
                    },
                },
            ],
        }
    }
}

impl CompensationConfig {
    pub fn parse(&self, decimals: u8) -> Result<CompensationParameters> {
        Ok(CompensationParameters {
            threshold_ratio: FixedPoint::parse(&self.threshold_ratio, decimals)
                .context("Invalid threshold_ratio")?,
            target_ratio: FixedPoint::parse(&self.target_ratio, decimals)
                .context("Invalid target_ratio")?,
            window_secs: self.window_secs,
            cooldown: self.cooldown,
        })
    }
}

impl ProtocolConfig {
    /// Assets flagged as stablecoins, in configured order.
    pub fn stablecoins(&self) -> impl Iterator<Item = &AssetConfig> {
        self.assets.iter().filter(|asset| asset.stablecoin)
    }

    /// The stablecoin the mock swap settles in.
    pub fn settlement_asset(&self) -> Option<&AssetConfig> {
        self.stablecoins().next()
    }

    /// Check the configuration can produce a coherent plan.
    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            anyhow::bail!("At least one base asset must be configured");
        }

        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if asset.symbol.trim().is_empty() {
                anyhow::bail!("Asset symbol must not be empty");
            }
            if !symbols.insert(asset.symbol.as_str()) {
                anyhow::bail!("Asset {} is configured twice", asset.symbol);
            }

            FixedPoint::parse(&asset.price, self.price_decimals)
                .with_context(|| format!("Invalid price for {}", asset.symbol))?;
            asset
                .compensation
                .parse(self.price_decimals)
                .with_context(|| format!("Invalid compensation parameters for {}", asset.symbol))?;
        }

        if self.settlement_asset().is_none() {
            anyhow::bail!("At least one asset must be flagged as a stablecoin");
        }

        FixedPoint::parse(&self.deposit_token.initial_supply, self.deposit_token.decimals)
            .context("Invalid deposit token initial_supply")?;
        FixedPoint::parse(&self.deposit_token.price, self.price_decimals)
            .context("Invalid deposit token price")?;

        Ok(())
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize protocol config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Depos.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = ProtocolConfig::default();
        config.validate().unwrap();
        assert_eq!(config.settlement_asset().unwrap().symbol, "USDC");
    }

    #[test]
    fn test_duplicate_symbol_is_rejected() {
        let mut config = ProtocolConfig::default();
        let usdc = config.assets[0].clone();
        config.assets.push(usdc);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_missing_stablecoin_is_rejected() {
        let mut config = ProtocolConfig::default();
        config.assets.retain(|asset| !asset.stablecoin);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_ratio_is_rejected() {
        let mut config = ProtocolConfig::default();
        config.assets[1].compensation.target_ratio = "ninety five".to_string();

        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("ETH"));
    }

    #[test]
    fn test_numeric_amounts_are_accepted() {
        let config: ProtocolConfig = toml::from_str(
            r#"
            price_decimals = 6

            [deposit_token]
            initial_supply = 1000000
            decimals = 18
            price = 12.5

            [[assets]]
            symbol = "USDC"
            decimals = 6
            price = 1
            stablecoin = true

            [assets.compensation]
            threshold_ratio = 0.8
            target_ratio = "0.99"
            window_secs = 3600
            cooldown = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.deposit_token.initial_supply, "1000000");
        assert_eq!(config.deposit_token.price, "12.5");
        assert_eq!(config.assets[0].price, "1");
        assert_eq!(config.assets[0].compensation.threshold_ratio, "0.8");
        assert_eq!(config.assets[0].compensation.target_ratio, "0.99");
        config.validate().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("depos-test").expect("Failed to create temp dir");
        let config = ProtocolConfig::default();

        config
            .save_to_file(&temp_dir.path().join(CONFIG_FILENAME))
            .expect("Failed to save config");

        // Loading from the directory picks up the default file name.
        let loaded =
            ProtocolConfig::load_from_file(temp_dir.path()).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new("depos-test").expect("Failed to create temp dir");
        assert!(ProtocolConfig::load_from_file(&temp_dir.path().join("nope.toml")).is_err());
    }
}
