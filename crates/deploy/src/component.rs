//! Component model: what gets deployed, how it is wired, and what it is seeded with.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{
        U256,
        utils::{format_units, parse_units},
    },
};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{AddressRegistry, DeployError};

/// The contracts that make up the protocol, named after their compiled artifacts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum Contract {
    Oracle,
    MockSwap,
    #[strum(serialize = "MockERC20")]
    #[serde(rename = "MockERC20")]
    MockErc20,
    AssetManager,
    Depos,
    #[strum(serialize = "AMOManager")]
    #[serde(rename = "AMOManager")]
    AmoManager,
    #[strum(serialize = "Example_AMO")]
    #[serde(rename = "Example_AMO")]
    ExampleAmo,
    InsuranceVault,
    BuybackVault,
    Pool,
}

impl Contract {
    /// Key for the single instance of this contract.
    pub fn key(self) -> ComponentKey {
        ComponentKey {
            contract: self,
            instance: None,
        }
    }

    /// Key for one of several instances of this contract.
    pub fn instance(self, instance: impl Into<String>) -> ComponentKey {
        ComponentKey {
            contract: self,
            instance: Some(instance.into()),
        }
    }
}

/// Registry key: a contract, plus an instance key when the contract is deployed more than once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey {
    pub contract: Contract,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}[{}]", self.contract, instance),
            None => write!(f, "{}", self.contract),
        }
    }
}

/// Non-negative decimal amount stored with a fixed number of fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    raw: U256,
    decimals: u8,
}

impl FixedPoint {
    /// Parse a decimal string such as `"2000"` or `"0.95"`.
    pub fn parse(value: &str, decimals: u8) -> anyhow::Result<Self> {
        if value.trim_start().starts_with('-') {
            anyhow::bail!("Negative amount is not allowed: {}", value);
        }

        let raw = parse_units(value.trim(), decimals)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid decimal amount '{}'", value))?
            .get_absolute();

        Ok(Self { raw, decimals })
    }

    pub fn from_raw(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// The integer representation sent on-chain.
    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_units(self.raw, self.decimals) {
            Ok(formatted) => f.write_str(&formatted),
            Err(_) => write!(f, "{}e-{}", self.raw, self.decimals),
        }
    }
}

/// A constructor or call argument.
///
/// `Ref` is an address reference resolved against the registry when the step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Ref(ComponentKey),
    Uint(U256),
    Uint8(u8),
    Str(String),
}

impl Arg {
    pub fn amount(amount: FixedPoint) -> Self {
        Self::Uint(amount.raw())
    }

    /// The component this argument points at, if any.
    pub fn reference(&self) -> Option<&ComponentKey> {
        match self {
            Self::Ref(key) => Some(key),
            _ => None,
        }
    }

    /// Resolve into an ABI value, looking address references up in the registry.
    pub fn resolve(
        &self,
        registry: &AddressRegistry,
        required_by: &str,
    ) -> Result<DynSolValue, DeployError> {
        Ok(match self {
            Self::Ref(key) => DynSolValue::Address(registry.resolve(key, required_by)?),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Uint8(value) => DynSolValue::Uint(U256::from(*value), 8),
            Self::Str(value) => DynSolValue::String(value.clone()),
        })
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(key) => write!(f, "{}", key),
            Self::Uint(value) => write!(f, "{}", value),
            Self::Uint8(value) => write!(f, "{}", value),
            Self::Str(value) => write!(f, "{:?}", value),
        }
    }
}

pub(crate) fn resolve_all(
    args: &[Arg],
    registry: &AddressRegistry,
    required_by: &str,
) -> Result<Vec<DynSolValue>, DeployError> {
    args.iter()
        .map(|arg| arg.resolve(registry, required_by))
        .collect()
}

fn join(args: &[Arg]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A component to instantiate, with its constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub key: ComponentKey,
    pub constructor_args: Vec<Arg>,
}

impl ComponentSpec {
    pub fn new(key: ComponentKey) -> Self {
        Self {
            key,
            constructor_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    pub fn reference(self, key: ComponentKey) -> Self {
        self.arg(Arg::Ref(key))
    }

    /// Components that must already be deployed before this one.
    pub fn dependencies(&self) -> impl Iterator<Item = &ComponentKey> {
        self.constructor_args.iter().filter_map(Arg::reference)
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new {}({})", self.key, join(&self.constructor_args))
    }
}

/// A post-construction call storing `target`'s address inside `source`.
///
/// `key` is an optional leading reference for keyed setters such as
/// `AddAssetAmo(asset, amo)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringEdge {
    pub source: ComponentKey,
    pub setter: String,
    pub key: Option<ComponentKey>,
    pub target: ComponentKey,
}

impl WiringEdge {
    pub fn new(source: ComponentKey, setter: impl Into<String>, target: ComponentKey) -> Self {
        Self {
            source,
            setter: setter.into(),
            key: None,
            target,
        }
    }

    pub fn keyed(
        source: ComponentKey,
        setter: impl Into<String>,
        key: ComponentKey,
        target: ComponentKey,
    ) -> Self {
        Self {
            source,
            setter: setter.into(),
            key: Some(key),
            target,
        }
    }

    /// Every component this edge reads or writes.
    pub fn endpoints(&self) -> impl Iterator<Item = &ComponentKey> {
        std::iter::once(&self.source)
            .chain(self.key.as_ref())
            .chain(std::iter::once(&self.target))
    }

    pub fn args(&self) -> Vec<Arg> {
        self.key
            .iter()
            .chain(std::iter::once(&self.target))
            .cloned()
            .map(Arg::Ref)
            .collect()
    }
}

impl fmt::Display for WiringEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.source, self.setter, join(&self.args()))
    }
}

/// Risk parameters the pool applies when compensating holders of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensationParameters {
    /// Collateral ratio below which compensation kicks in.
    pub threshold_ratio: FixedPoint,
    /// Ratio compensation aims to restore.
    pub target_ratio: FixedPoint,
    pub window_secs: u64,
    pub cooldown: u64,
}

/// The two kinds of initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    /// `setPrice(asset, price)`.
    Price { asset: ComponentKey, price: FixedPoint },
    /// `setCompensateParameters(asset, threshold, target, window, cooldown)`.
    Parameters {
        asset: ComponentKey,
        parameters: CompensationParameters,
    },
}

/// One initial-state call against `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFact {
    pub target: ComponentKey,
    pub fact: Fact,
}

impl SeedFact {
    pub fn price(target: ComponentKey, asset: ComponentKey, price: FixedPoint) -> Self {
        Self {
            target,
            fact: Fact::Price { asset, price },
        }
    }

    pub fn parameters(
        target: ComponentKey,
        asset: ComponentKey,
        parameters: CompensationParameters,
    ) -> Self {
        Self {
            target,
            fact: Fact::Parameters { asset, parameters },
        }
    }

    pub fn operation(&self) -> &'static str {
        match self.fact {
            Fact::Price { .. } => "setPrice",
            Fact::Parameters { .. } => "setCompensateParameters",
        }
    }

    pub fn subject(&self) -> &ComponentKey {
        match &self.fact {
            Fact::Price { asset, .. } | Fact::Parameters { asset, .. } => asset,
        }
    }

    pub fn args(&self) -> Vec<Arg> {
        match &self.fact {
            Fact::Price { asset, price } => vec![Arg::Ref(asset.clone()), Arg::amount(*price)],
            Fact::Parameters { asset, parameters } => vec![
                Arg::Ref(asset.clone()),
                Arg::amount(parameters.threshold_ratio),
                Arg::amount(parameters.target_ratio),
                Arg::Uint(U256::from(parameters.window_secs)),
                Arg::Uint(U256::from(parameters.cooldown)),
            ],
        }
    }
}

impl fmt::Display for SeedFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fact {
            Fact::Price { asset, price } => {
                write!(f, "{}.setPrice({}, {})", self.target, asset, price)
            }
            Fact::Parameters { asset, parameters } => write!(
                f,
                "{}.setCompensateParameters({}, {}, {}, {}s, {})",
                self.target,
                asset,
                parameters.threshold_ratio,
                parameters.target_ratio,
                parameters.window_secs,
                parameters.cooldown
            ),
        }
    }
}
