//! Construction phase: instantiate components in dependency order.

use alloy_core::primitives::Address;

use crate::{
    AddressRegistry, ComponentSpec, ContractFactory, DeployError, component::resolve_all,
};

/// Deploys components one at a time, feeding each address back into the registry.
pub struct DeploymentOrchestrator<'f, F> {
    factory: &'f mut F,
}

impl<'f, F: ContractFactory> DeploymentOrchestrator<'f, F> {
    pub fn new(factory: &'f mut F) -> Self {
        Self { factory }
    }

    /// Instantiate `spec` and record its address.
    ///
    /// Every address reference in the constructor arguments must already be in
    /// the registry, and the component itself must not be.
    pub async fn deploy(
        &mut self,
        registry: &mut AddressRegistry,
        spec: &ComponentSpec,
    ) -> Result<Address, DeployError> {
        let required_by = format!("new {}", spec.key);
        let args = resolve_all(&spec.constructor_args, registry, &required_by)?;

        // Checked before submission so a name collision never costs a transaction.
        if registry.contains(&spec.key) {
            return Err(DeployError::DuplicateComponent(spec.key.clone()));
        }

        tracing::debug!(component = %spec.key, args = args.len(), "Submitting deployment");

        let address = self
            .factory
            .instantiate(spec.key.contract.as_ref(), args)
            .await?;

        registry.insert(spec.key.clone(), address)?;

        tracing::info!(component = %spec.key, %address, "Component deployed");

        Ok(address)
    }
}
