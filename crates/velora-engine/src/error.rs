//! Engine error types.
//!
//! Policy violations are not errors; they are verdicts. These variants cover
//! the cases where enforcement itself could not run for a scope.

use velora_topology::{ProviderError, ResourceId};

use crate::phase::ScopePhase;
use crate::verdict::ResourceKind;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("hub {hub} not found for scope {scope}")]
    HubUnresolved { scope: String, hub: String },

    #[error("no NVA next hop defined for hub {hub}")]
    MissingNvaNextHop { hub: String },

    #[error("failed to build client for scope {scope}: {source}")]
    Client {
        scope: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to {operation} {resource}: {source}")]
    Fetch {
        operation: &'static str,
        kind: ResourceKind,
        resource: ResourceId,
        #[source]
        source: ProviderError,
    },

    #[error("invalid phase transition for scope {scope}: {from:?} -> {to:?}")]
    InvalidTransition {
        scope: String,
        from: ScopePhase,
        to: ScopePhase,
    },

    #[error("scope {scope} is not part of the policy")]
    UnknownScope { scope: String },

    #[error("report slot for scope {scope} already written")]
    SlotTaken { scope: String },

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn fetch(
        operation: &'static str,
        kind: ResourceKind,
        resource: &ResourceId,
        source: ProviderError,
    ) -> Self {
        Self::Fetch {
            operation,
            kind,
            resource: resource.clone(),
            source,
        }
    }

    /// Resource the error is about, when there is one
    pub fn resource(&self) -> Option<(&ResourceId, ResourceKind)> {
        match self {
            Self::Fetch { resource, kind, .. } => Some((resource, *kind)),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
