//! The fixed provisioning sequence and the loop that executes it.
//!
//! All components are constructed first, with only arguments that can be
//! resolved at that point. References that would form a cycle (a vault needs
//! the pool, the pool needs the vault) are closed afterwards by wiring edges.
//! Seeding comes last for each target.

use std::{collections::HashSet, fmt};

use anyhow::{Context, Result};

use crate::{
    AddressRegistry, Arg, ComponentKey, ComponentSpec, ConfigurationBinder, Contract,
    ContractFactory, DeployError, DeploymentOrchestrator, FixedPoint, ProtocolConfig, SeedFact,
    StateSeeder, WiringEdge,
};

/// One unit of work, confirmed on-chain before the next one starts.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum Step {
    Deploy(ComponentSpec),
    Bind(WiringEdge),
    Seed(SeedFact),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deploy(_) => "deploy",
            Self::Bind(_) => "bind",
            Self::Seed(_) => "seed",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy(spec) => fmt::Display::fmt(spec, f),
            Self::Bind(edge) => fmt::Display::fmt(edge, f),
            Self::Seed(fact) => fmt::Display::fmt(fact, f),
        }
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref)]
pub struct DeploymentPlan {
    steps: Vec<Step>,
}

impl DeploymentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Into<Step>) -> &mut Self {
        self.steps.push(step.into());
        self
    }

    /// Keys of every component this plan deploys, in order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentKey> {
        self.steps.iter().filter_map(|step| match step {
            Step::Deploy(spec) => Some(&spec.key),
            _ => None,
        })
    }

    /// The full protocol bring-up.
    pub fn protocol(config: &ProtocolConfig) -> Result<Self> {
        config.validate()?;

        let decimals = config.price_decimals;
        let oracle = Contract::Oracle.key();
        let swap = Contract::MockSwap.key();
        let asset_manager = Contract::AssetManager.key();
        let depos = Contract::Depos.key();
        let amo_manager = Contract::AmoManager.key();
        let insurance_vault = Contract::InsuranceVault.key();
        let buyback_vault = Contract::BuybackVault.key();
        let pool = Contract::Pool.key();
        let token = |symbol: &str| Contract::MockErc20.instance(symbol);
        let amo = |symbol: &str| Contract::ExampleAmo.instance(symbol);

        let mut plan = Self::new();

        // Construction. Every reference points backwards.
        plan.push(ComponentSpec::new(oracle.clone()));
        plan.push(ComponentSpec::new(swap.clone()));
        for asset in &config.assets {
            plan.push(
                ComponentSpec::new(token(&asset.symbol))
                    .arg(Arg::Str(asset.symbol.clone()))
                    .arg(Arg::Str(asset.symbol.clone()))
                    .arg(Arg::Uint8(asset.decimals))
                    .reference(swap.clone()),
            );
        }
        plan.push(ComponentSpec::new(asset_manager.clone()));

        let supply = FixedPoint::parse(
            &config.deposit_token.initial_supply,
            config.deposit_token.decimals,
        )
        .context("Invalid deposit token initial_supply")?;
        plan.push(
            ComponentSpec::new(depos.clone())
                .arg(Arg::amount(supply))
                .reference(oracle.clone()),
        );
        plan.push(
            ComponentSpec::new(amo_manager.clone())
                .reference(asset_manager.clone())
                .reference(oracle.clone()),
        );
        for asset in &config.assets {
            plan.push(
                ComponentSpec::new(amo(&asset.symbol))
                    .reference(amo_manager.clone())
                    .reference(token(&asset.symbol)),
            );
        }
        plan.push(
            ComponentSpec::new(insurance_vault.clone())
                .reference(depos.clone())
                .reference(oracle.clone())
                .reference(asset_manager.clone())
                .reference(amo_manager.clone())
                .reference(swap.clone()),
        );
        plan.push(
            ComponentSpec::new(buyback_vault.clone())
                .reference(depos.clone())
                .reference(oracle.clone())
                .reference(asset_manager.clone())
                .reference(amo_manager.clone()),
        );
        plan.push(
            ComponentSpec::new(pool.clone())
                .reference(depos.clone())
                .reference(oracle.clone())
                .reference(asset_manager.clone())
                .reference(amo_manager.clone())
                .reference(insurance_vault.clone()),
        );

        // The swap settles in the first stablecoin.
        if let Some(settlement) = config.settlement_asset() {
            plan.push(WiringEdge::new(
                swap.clone(),
                "setMockERC20",
                token(&settlement.symbol),
            ));
        }

        for asset in &config.assets {
            let price = FixedPoint::parse(&asset.price, decimals)
                .with_context(|| format!("Invalid price for {}", asset.symbol))?;
            plan.push(SeedFact::price(oracle.clone(), token(&asset.symbol), price));
        }

        for asset in &config.assets {
            plan.push(WiringEdge::new(
                asset_manager.clone(),
                "addAsset",
                token(&asset.symbol),
            ));
        }

        let depos_price = FixedPoint::parse(&config.deposit_token.price, decimals)
            .context("Invalid deposit token price")?;
        plan.push(SeedFact::price(oracle.clone(), depos.clone(), depos_price));

        for asset in &config.assets {
            plan.push(WiringEdge::new(amo_manager.clone(), "AddAMO", amo(&asset.symbol)));
        }
        for asset in &config.assets {
            plan.push(WiringEdge::keyed(
                amo_manager.clone(),
                "AddAssetAmo",
                token(&asset.symbol),
                amo(&asset.symbol),
            ));
        }

        plan.push(WiringEdge::new(
            amo_manager.clone(),
            "setInsuranceVaultAddress",
            insurance_vault.clone(),
        ));
        for asset in config.stablecoins() {
            plan.push(WiringEdge::new(
                insurance_vault.clone(),
                "addSupportedStablecoin",
                token(&asset.symbol),
            ));
        }

        plan.push(WiringEdge::new(
            depos.clone(),
            "setBuybackVaultAddress",
            buyback_vault.clone(),
        ));
        plan.push(WiringEdge::new(
            amo_manager.clone(),
            "setBuybackVaultAddress",
            buyback_vault.clone(),
        ));

        for source in [&depos, &amo_manager, &insurance_vault, &buyback_vault] {
            plan.push(WiringEdge::new(source.clone(), "setPoolAddress", pool.clone()));
        }

        for asset in &config.assets {
            let parameters = asset
                .compensation
                .parse(decimals)
                .with_context(|| format!("Invalid compensation parameters for {}", asset.symbol))?;
            plan.push(SeedFact::parameters(pool.clone(), token(&asset.symbol), parameters));
        }

        Ok(plan)
    }

    /// Replay the plan against the keys already in `registry` without touching a chain.
    ///
    /// Fails on the first step that would deploy an existing key, reference a
    /// key that is not deployed yet, or wire a component after it was seeded.
    pub fn validate(&self, registry: &AddressRegistry) -> Result<(), DeployError> {
        let mut deployed: HashSet<&ComponentKey> = registry.iter().map(|c| &c.key).collect();
        let mut seeded: HashSet<&ComponentKey> = HashSet::new();

        let require = |deployed: &HashSet<&ComponentKey>, key: &ComponentKey, step: &Step| {
            if deployed.contains(key) {
                Ok(())
            } else {
                Err(DeployError::UnresolvedDependency {
                    dependency: key.clone(),
                    required_by: step.to_string(),
                })
            }
        };

        for step in &self.steps {
            match step {
                Step::Deploy(spec) => {
                    for dependency in spec.dependencies() {
                        require(&deployed, dependency, step)?;
                    }
                    if !deployed.insert(&spec.key) {
                        return Err(DeployError::DuplicateComponent(spec.key.clone()));
                    }
                }
                Step::Bind(edge) => {
                    for endpoint in edge.endpoints() {
                        require(&deployed, endpoint, step)?;
                        if seeded.contains(endpoint) {
                            return Err(DeployError::WiringAfterSeed {
                                edge: edge.to_string(),
                                component: endpoint.clone(),
                            });
                        }
                    }
                }
                Step::Seed(fact) => {
                    require(&deployed, &fact.target, step)?;
                    require(&deployed, fact.subject(), step)?;
                    seeded.insert(&fact.target);
                }
            }
        }

        Ok(())
    }
}

/// Drives a plan through a single factory, strictly one step at a time.
pub struct Provisioner<F> {
    factory: F,
}

impl<F: ContractFactory> Provisioner<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn into_factory(self) -> F {
        self.factory
    }

    /// Execute every step of `plan`, threading the registry through.
    ///
    /// The plan is validated against `registry` first, so nothing is submitted
    /// for a plan that cannot complete. The first failing step aborts the run.
    pub async fn run(
        &mut self,
        plan: &DeploymentPlan,
        mut registry: AddressRegistry,
    ) -> Result<AddressRegistry, DeployError> {
        plan.validate(&registry)?;

        let total = plan.len();
        tracing::info!(steps = total, "Starting provisioning run");

        for (index, step) in plan.iter().enumerate() {
            tracing::debug!(step = index + 1, total, kind = step.kind(), %step, "Executing step");

            let outcome = match step {
                Step::Deploy(spec) => DeploymentOrchestrator::new(&mut self.factory)
                    .deploy(&mut registry, spec)
                    .await
                    .map(|_| ()),
                Step::Bind(edge) => ConfigurationBinder::new(&mut self.factory)
                    .bind(&registry, edge)
                    .await
                    .map(|_| ()),
                Step::Seed(fact) => StateSeeder::new(&mut self.factory)
                    .seed(&registry, fact)
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = outcome {
                tracing::error!(step = index + 1, total, %step, error = %e, "Provisioning aborted");
                return Err(e);
            }
        }

        tracing::info!(components = registry.len(), "Provisioning complete");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_plan() -> DeploymentPlan {
        DeploymentPlan::protocol(&ProtocolConfig::default()).unwrap()
    }

    #[test]
    fn test_default_plan_is_valid() {
        default_plan().validate(&AddressRegistry::new()).unwrap();
    }

    #[test]
    fn test_default_plan_deploys_every_component_once() {
        let plan = default_plan();
        let keys: Vec<String> = plan.components().map(ToString::to_string).collect();

        assert_eq!(
            keys,
            vec![
                "Oracle",
                "MockSwap",
                "MockERC20[USDC]",
                "MockERC20[ETH]",
                "AssetManager",
                "Depos",
                "AMOManager",
                "Example_AMO[USDC]",
                "Example_AMO[ETH]",
                "InsuranceVault",
                "BuybackVault",
                "Pool",
            ]
        );
    }

    #[test]
    fn test_all_deploys_precede_wiring() {
        let plan = default_plan();
        let first_non_deploy = plan
            .iter()
            .position(|step| !matches!(step, Step::Deploy(_)))
            .unwrap();

        assert!(
            plan[first_non_deploy..]
                .iter()
                .all(|step| !matches!(step, Step::Deploy(_)))
        );
    }

    #[test]
    fn test_post_deploy_order() {
        let plan = default_plan();
        let after_deploys: Vec<String> = plan
            .iter()
            .filter(|step| !matches!(step, Step::Deploy(_)))
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            after_deploys,
            vec![
                "MockSwap.setMockERC20(MockERC20[USDC])",
                "Oracle.setPrice(MockERC20[USDC], 1.000000)",
                "Oracle.setPrice(MockERC20[ETH], 2000.000000)",
                "AssetManager.addAsset(MockERC20[USDC])",
                "AssetManager.addAsset(MockERC20[ETH])",
                "Oracle.setPrice(Depos, 10.000000)",
                "AMOManager.AddAMO(Example_AMO[USDC])",
                "AMOManager.AddAMO(Example_AMO[ETH])",
                "AMOManager.AddAssetAmo(MockERC20[USDC], Example_AMO[USDC])",
                "AMOManager.AddAssetAmo(MockERC20[ETH], Example_AMO[ETH])",
                "AMOManager.setInsuranceVaultAddress(InsuranceVault)",
                "InsuranceVault.addSupportedStablecoin(MockERC20[USDC])",
                "Depos.setBuybackVaultAddress(BuybackVault)",
                "AMOManager.setBuybackVaultAddress(BuybackVault)",
                "Depos.setPoolAddress(Pool)",
                "AMOManager.setPoolAddress(Pool)",
                "InsuranceVault.setPoolAddress(Pool)",
                "BuybackVault.setPoolAddress(Pool)",
                "Pool.setCompensateParameters(MockERC20[USDC], 0.800000, 0.990000, 3600s, 1)",
                "Pool.setCompensateParameters(MockERC20[ETH], 0.800000, 0.950000, 3600s, 1)",
            ]
        );
    }

    #[test]
    fn test_validate_catches_forward_reference() {
        let mut plan = DeploymentPlan::new();
        plan.push(ComponentSpec::new(Contract::Pool.key()).reference(Contract::Depos.key()));
        plan.push(ComponentSpec::new(Contract::Depos.key()));

        let err = plan.validate(&AddressRegistry::new()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::UnresolvedDependency { ref dependency, .. }
                if *dependency == Contract::Depos.key()
        ));
    }

    #[test]
    fn test_validate_catches_duplicate_against_existing_registry() {
        let plan = default_plan();
        let mut registry = AddressRegistry::new();
        registry
            .insert(Contract::Oracle.key(), alloy_core::primitives::Address::repeat_byte(1))
            .unwrap();

        assert_eq!(
            plan.validate(&registry).unwrap_err(),
            DeployError::DuplicateComponent(Contract::Oracle.key())
        );
    }

    #[test]
    fn test_validate_catches_wiring_after_seed() {
        let mut plan = DeploymentPlan::new();
        plan.push(ComponentSpec::new(Contract::Oracle.key()));
        plan.push(
            ComponentSpec::new(Contract::Depos.key())
                .arg(Arg::Uint(alloy_core::primitives::U256::from(1u64)))
                .reference(Contract::Oracle.key()),
        );
        plan.push(ComponentSpec::new(Contract::Pool.key()));
        plan.push(SeedFact::price(
            Contract::Oracle.key(),
            Contract::Depos.key(),
            FixedPoint::parse("10", 6).unwrap(),
        ));
        plan.push(WiringEdge::new(Contract::Depos.key(), "setPoolAddress", Contract::Pool.key()));

        // Wiring Depos after pricing it on the oracle is fine: only the seeded
        // target (the oracle) is frozen.
        plan.validate(&AddressRegistry::new()).unwrap();

        plan.push(WiringEdge::new(Contract::Oracle.key(), "setPoolAddress", Contract::Pool.key()));
        assert!(matches!(
            plan.validate(&AddressRegistry::new()).unwrap_err(),
            DeployError::WiringAfterSeed { .. }
        ));
    }

    #[test]
    fn test_protocol_rejects_invalid_config() {
        let mut config = ProtocolConfig::default();
        config.assets.clear();
        assert!(DeploymentPlan::protocol(&config).is_err());
    }
}
