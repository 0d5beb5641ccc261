//! depos-deploy - Provisioning library for the Depos protocol.
//!
//! This crate brings up a fresh instance of the protocol on an EVM chain:
//! it deploys every contract in dependency order, wires the references that
//! could not be passed at construction time, and seeds initial prices and
//! risk parameters.
//!
//! # Example
//!
//! ```no_run
//! use depos_deploy::{
//!     AddressRegistry, DeploymentPlan, ProtocolConfig, Provisioner, SimulatedChain,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let plan = DeploymentPlan::protocol(&ProtocolConfig::default())?;
//! let registry = Provisioner::new(SimulatedChain::new())
//!     .run(&plan, AddressRegistry::new())
//!     .await?;
//! println!("{}", depos_deploy::report::render(&registry));
//! # Ok(())
//! # }
//! ```

mod binder;
pub mod chain;
mod component;
mod config;
mod error;
mod factory;
mod orchestrator;
mod plan;
mod registry;
pub mod report;
pub mod rpc;
mod seeder;

pub use binder::ConfigurationBinder;
pub use chain::{RpcConfig, RpcContractFactory, SimulatedChain};
pub use component::{
    Arg, CompensationParameters, ComponentKey, ComponentSpec, Contract, Fact, FixedPoint,
    SeedFact, WiringEdge,
};
pub use config::{
    AssetConfig, CONFIG_FILENAME, CompensationConfig, DEFAULT_PRICE_DECIMALS, DepositTokenConfig,
    ProtocolConfig,
};
pub use error::DeployError;
pub use factory::{Confirmation, ContractFactory};
pub use orchestrator::DeploymentOrchestrator;
pub use plan::{DeploymentPlan, Provisioner, Step};
pub use registry::{AddressRegistry, DeployedComponent};
pub use seeder::StateSeeder;
