//! Wiring phase: close reference cycles once both ends exist.

use crate::{
    AddressRegistry, Confirmation, ContractFactory, DeployError, WiringEdge,
    component::resolve_all,
};

/// Applies wiring edges exactly in the order it is given them.
pub struct ConfigurationBinder<'f, F> {
    factory: &'f mut F,
}

impl<'f, F: ContractFactory> ConfigurationBinder<'f, F> {
    pub fn new(factory: &'f mut F) -> Self {
        Self { factory }
    }

    /// Call the edge's setter on its source component.
    pub async fn bind(
        &mut self,
        registry: &AddressRegistry,
        edge: &WiringEdge,
    ) -> Result<Confirmation, DeployError> {
        let required_by = edge.to_string();
        let source = registry.resolve(&edge.source, &required_by)?;
        let args = resolve_all(&edge.args(), registry, &required_by)?;

        let confirmation = self.factory.call(source, &edge.setter, args).await?;

        tracing::info!(
            source = %edge.source,
            setter = %edge.setter,
            target = %edge.target,
            tx_hash = %confirmation.tx_hash,
            "Wiring applied"
        );

        Ok(confirmation)
    }
}
