//! Provider traits consumed by the reconciliation engine.
//!
//! Implementations must be safe for concurrent use by many scope workers
//! (`Send + Sync`). Listing calls return one page at a time; use
//! [`crate::paginate`] to turn them into lazy streams.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::id::ResourceId;
use crate::types::{Network, Page, PageToken, Peering, Route, Subnet};

/// Read side of the topology provider, bound to one scope.
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    /// Lists the networks of the scope.
    async fn list_networks(&self, page: Option<PageToken>)
    -> Result<Page<Network>, ProviderError>;

    /// Lists the subnets of a network.
    async fn list_subnets(
        &self,
        network: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Subnet>, ProviderError>;

    /// Lists the routes of a route table.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::NotFound` if the route table does not exist.
    async fn list_routes(
        &self,
        route_table: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Route>, ProviderError>;

    /// Lists the peerings whose local side is the given network.
    async fn list_peerings(
        &self,
        network: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Peering>, ProviderError>;
}

/// Write side of the topology provider.
///
/// Every call carries the full desired payload and must be idempotent:
/// repeating a create-or-update with the same payload is a no-op, deleting
/// something already gone succeeds.
#[async_trait]
pub trait TopologyMutator: Send + Sync {
    /// Creates the named route in the table or replaces it wholesale.
    async fn create_or_update_route(
        &self,
        route_table: &ResourceId,
        route: &Route,
    ) -> Result<(), ProviderError>;

    /// Deletes the named route from the table.
    async fn delete_route(
        &self,
        route_table: &ResourceId,
        route_name: &str,
    ) -> Result<(), ProviderError>;

    /// Deletes a peering.
    async fn delete_peering(&self, peering: &ResourceId) -> Result<(), ProviderError>;
}

/// Immutable client bound to a single scope.
///
/// Built per reconciliation task by a [`ClientFactory`]; nothing about the
/// active scope is ever mutated on a shared client.
#[derive(Clone)]
pub struct ScopedClient {
    scope: String,
    provider: Arc<dyn TopologyProvider>,
    mutator: Arc<dyn TopologyMutator>,
}

impl ScopedClient {
    pub fn new(
        scope: impl Into<String>,
        provider: Arc<dyn TopologyProvider>,
        mutator: Arc<dyn TopologyMutator>,
    ) -> Self {
        Self {
            scope: scope.into(),
            provider,
            mutator,
        }
    }

    /// Scope this client is bound to
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn provider(&self) -> &Arc<dyn TopologyProvider> {
        &self.provider
    }

    pub fn mutator(&self) -> &Arc<dyn TopologyMutator> {
        &self.mutator
    }
}

impl fmt::Debug for ScopedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedClient")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Builds scope-bound clients from an authenticated credential.
///
/// How credentials are obtained is the implementor's business; the engine
/// only depends on this capability.
pub trait ClientFactory: Send + Sync {
    /// Returns a client bound to `scope`.
    ///
    /// # Errors
    ///
    /// Returns an error if no client can be built for the scope.
    fn client_for(&self, scope: &str) -> Result<ScopedClient, ProviderError>;
}
