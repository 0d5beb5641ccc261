//! Seeding phase: prices and risk parameters.

use crate::{
    AddressRegistry, Confirmation, ContractFactory, DeployError, SeedFact, component::resolve_all,
};

/// Issues initial business-state calls.
pub struct StateSeeder<'f, F> {
    factory: &'f mut F,
}

impl<'f, F: ContractFactory> StateSeeder<'f, F> {
    pub fn new(factory: &'f mut F) -> Self {
        Self { factory }
    }

    pub async fn seed(
        &mut self,
        registry: &AddressRegistry,
        fact: &SeedFact,
    ) -> Result<Confirmation, DeployError> {
        let required_by = fact.to_string();
        let target = registry.resolve(&fact.target, &required_by)?;
        let args = resolve_all(&fact.args(), registry, &required_by)?;

        let confirmation = self.factory.call(target, fact.operation(), args).await?;

        tracing::info!(
            target = %fact.target,
            subject = %fact.subject(),
            fact = %fact,
            "State seeded"
        );

        Ok(confirmation)
    }
}
