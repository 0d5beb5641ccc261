//! Errors raised while provisioning the protocol.
//!
//! None of these are recovered locally: the first one aborts the run.

use crate::component::ComponentKey;

/// Failure of a single provisioning step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// A constructor argument or wiring endpoint names a component that is not
    /// in the registry yet. This is an ordering bug in the plan.
    #[error(
        "unresolved dependency: {dependency} is required by {required_by} but has not been deployed"
    )]
    UnresolvedDependency {
        dependency: ComponentKey,
        required_by: String,
    },

    /// A component was deployed twice under the same key.
    #[error("duplicate component: {0} is already deployed")]
    DuplicateComponent(ComponentKey),

    /// The chain client rejected a submitted operation.
    #[error("network rejected {operation}: {reason}")]
    NetworkRejection { operation: String, reason: String },

    /// A compiled artifact is missing or does not match the arguments it is given.
    #[error("invalid artifact for {component}: {reason}")]
    InvalidArtifact { component: String, reason: String },

    /// A wiring edge touches a component whose initial state was already seeded.
    #[error("wiring {edge} touches {component}, which was already seeded")]
    WiringAfterSeed {
        edge: String,
        component: ComponentKey,
    },
}

impl DeployError {
    pub(crate) fn rejected(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::NetworkRejection {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure came from the chain rather than from the plan itself.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkRejection { .. })
    }
}
