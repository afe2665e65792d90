//! Fetching topology for a scope.
//!
//! Listings are paged lazily and every page request runs under the retry
//! policy, so one throttled page does not fail a whole scope.

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use velora_topology::{
    Network, Page, PageToken, Peering, ProviderError, ResourceId, RouteTable, ScopedClient, Subnet,
    TopologyProvider, paginate,
};

use crate::diff::scope_resource;
use crate::error::{EngineError, EngineResult};
use crate::retry::RetryPolicy;
use crate::snapshot::{NetworkSnapshot, route_table_ids};
use crate::verdict::ResourceKind;

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: ScopedClient,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(client: ScopedClient, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            retry,
            cancel,
        }
    }

    /// Lazy stream of the scope's networks.
    pub fn networks(&self) -> BoxStream<'_, EngineResult<Network>> {
        let scope = scope_resource(self.client.scope());
        self.list("list_networks", |provider, page| async move {
            provider.list_networks(page).await
        })
        .map_err(move |e| EngineError::fetch("list networks of", ResourceKind::Scope, &scope, e))
        .boxed()
    }

    /// Fetch everything the diff needs for one network.
    pub async fn network(
        &self,
        network: Network,
        with_route_tables: bool,
    ) -> EngineResult<NetworkSnapshot> {
        let (subnets, peerings) =
            future::try_join(self.subnets(&network.id), self.peerings(&network.id)).await?;

        let mut route_tables = Vec::new();
        if with_route_tables {
            for id in route_table_ids(&subnets) {
                route_tables.push(self.route_table(&id).await?);
            }
        }
        Ok(NetworkSnapshot {
            network,
            subnets,
            peerings,
            route_tables,
        })
    }

    pub async fn subnets(&self, network: &ResourceId) -> EngineResult<Vec<Subnet>> {
        let id = network.clone();
        self.list("list_subnets", move |provider, page| {
            let id = id.clone();
            async move { provider.list_subnets(&id, page).await }
        })
        .try_collect()
        .await
        .map_err(|e| EngineError::fetch("list subnets of", ResourceKind::Network, network, e))
    }

    pub async fn peerings(&self, network: &ResourceId) -> EngineResult<Vec<Peering>> {
        let id = network.clone();
        self.list("list_peerings", move |provider, page| {
            let id = id.clone();
            async move { provider.list_peerings(&id, page).await }
        })
        .try_collect()
        .await
        .map_err(|e| EngineError::fetch("list peerings of", ResourceKind::Network, network, e))
    }

    pub async fn route_table(&self, route_table: &ResourceId) -> EngineResult<RouteTable> {
        let id = route_table.clone();
        let routes = self
            .list("list_routes", move |provider, page| {
                let id = id.clone();
                async move { provider.list_routes(&id, page).await }
            })
            .try_collect()
            .await
            .map_err(|e| {
                EngineError::fetch("list routes of", ResourceKind::RouteTable, route_table, e)
            })?;
        Ok(RouteTable {
            id: route_table.clone(),
            routes,
        })
    }

    fn list<'s, T, F, Fut>(
        &'s self,
        operation: &'static str,
        call: F,
    ) -> BoxStream<'s, Result<T, ProviderError>>
    where
        T: Send + 's,
        F: Fn(Arc<dyn TopologyProvider>, Option<PageToken>) -> Fut + Clone + Send + Sync + 's,
        Fut: Future<Output = Result<Page<T>, ProviderError>> + Send + 's,
    {
        let provider = self.client.provider().clone();
        paginate(move |page: Option<PageToken>| {
            let provider = provider.clone();
            let call = call.clone();
            async move {
                self.retry
                    .run(operation, &self.cancel, || {
                        call(provider.clone(), page.clone())
                    })
                    .await
            }
        })
    }
}
