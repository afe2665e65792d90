//! In-memory topology provider.
//!
//! Serves a [`TopologySnapshot`] document through the provider, mutator and
//! client factory traits. Used for offline (what-if) runs from the CLI and as
//! the test double for the engine: listings are paged with a configurable
//! page size and faults can be injected per scope and operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ProviderError;
use crate::id::ResourceId;
use crate::traits::{ClientFactory, ScopedClient, TopologyMutator, TopologyProvider};
use crate::types::{Network, Page, PageToken, Peering, Route, Subnet};

const DEFAULT_PAGE_SIZE: usize = 50;

/// Serializable topology of every scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub scopes: BTreeMap<String, ScopeTopology>,
}

impl TopologySnapshot {
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(json)
            .map_err(|e| ProviderError::bad_request(format!("invalid topology snapshot: {e}")))
    }

    pub fn to_json(&self) -> Result<String, ProviderError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ProviderError::internal(format!("failed to serialize topology: {e}")))
    }
}

/// Topology of one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTopology {
    #[serde(default)]
    pub networks: Vec<NetworkRecord>,
    #[serde(default)]
    pub route_tables: Vec<RouteTable>,
}

impl ScopeTopology {
    pub fn network(&self, id: &ResourceId) -> Option<&NetworkRecord> {
        self.networks.iter().find(|n| n.network.id.same_resource(id))
    }

    pub fn route_table(&self, id: &ResourceId) -> Option<&RouteTable> {
        self.route_tables.iter().find(|t| t.id.same_resource(id))
    }

    fn route_table_mut(&mut self, id: &ResourceId) -> Option<&mut RouteTable> {
        self.route_tables.iter_mut().find(|t| t.id.same_resource(id))
    }
}

/// A network with its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(flatten)]
    pub network: Network,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub peerings: Vec<Peering>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: ResourceId,
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Provider operations, used for fault injection and the mutation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Building a scoped client
    Connect,
    ListNetworks,
    ListSubnets,
    ListRoutes,
    ListPeerings,
    CreateOrUpdateRoute,
    DeleteRoute,
    DeletePeering,
}

/// A recorded mutation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub scope: String,
    pub operation: Operation,
    pub target: ResourceId,
    pub detail: Option<String>,
}

#[derive(Debug)]
struct Fault {
    scope: Option<String>,
    operation: Operation,
    remaining: u32,
    error: ProviderError,
}

#[derive(Debug)]
struct Inner {
    state: RwLock<TopologySnapshot>,
    page_size: usize,
    faults: Mutex<Vec<Fault>>,
    mutations: Mutex<Vec<MutationRecord>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

/// Concurrency-safe in-memory topology.
#[derive(Debug, Clone)]
pub struct InMemoryTopology {
    inner: Arc<Inner>,
}

impl Default for InMemoryTopology {
    fn default() -> Self {
        Self::new(TopologySnapshot::default())
    }
}

impl InMemoryTopology {
    /// Creates a provider serving the given snapshot with the default page size.
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self::with_page_size(snapshot, DEFAULT_PAGE_SIZE)
    }

    /// Creates a provider with a custom page size (minimum 1).
    pub fn with_page_size(snapshot: TopologySnapshot, page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(snapshot),
                page_size: page_size.max(1),
                faults: Mutex::new(Vec::new()),
                mutations: Mutex::new(Vec::new()),
                calls: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Loads a snapshot document from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProviderError::internal(format!("failed to read {}: {e}", path.display()))
        })?;
        Ok(Self::new(TopologySnapshot::from_json(&content)?))
    }

    /// Writes the current state back out as a JSON document.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ProviderError> {
        let path = path.as_ref();
        let json = self.snapshot().await.to_json()?;
        tokio::fs::write(path, json).await.map_err(|e| {
            ProviderError::internal(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> TopologySnapshot {
        self.inner.state.read().await.clone()
    }

    /// Fail the next `times` calls of `operation` (optionally only for one scope).
    pub fn inject_fault(
        &self,
        scope: Option<&str>,
        operation: Operation,
        times: u32,
        error: ProviderError,
    ) {
        if let Ok(mut faults) = self.inner.faults.lock() {
            faults.push(Fault {
                scope: scope.map(str::to_string),
                operation,
                remaining: times,
                error,
            });
        }
    }

    /// Mutation calls received so far, in order
    pub fn mutations(&self) -> Vec<MutationRecord> {
        self.inner
            .mutations
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn clear_mutations(&self) {
        if let Ok(mut m) = self.inner.mutations.lock() {
            m.clear();
        }
    }

    /// Number of calls (including failed ones) made for an operation
    pub fn call_count(&self, operation: Operation) -> usize {
        self.inner
            .calls
            .lock()
            .ok()
            .and_then(|c| c.get(&operation).copied())
            .unwrap_or(0)
    }

    fn scoped(&self, scope: &str) -> ScopedMemoryClient {
        ScopedMemoryClient {
            scope: scope.to_string(),
            inner: self.inner.clone(),
        }
    }
}

impl ClientFactory for InMemoryTopology {
    fn client_for(&self, scope: &str) -> Result<ScopedClient, ProviderError> {
        self.inner.enter(scope, Operation::Connect)?;
        let client = Arc::new(self.scoped(scope));
        Ok(ScopedClient::new(scope, client.clone(), client))
    }
}

impl Inner {
    /// Counts the call and fires a pending fault, if any.
    fn enter(&self, scope: &str, operation: Operation) -> Result<(), ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(operation).or_default() += 1;
        }
        let Ok(mut faults) = self.faults.lock() else {
            return Ok(());
        };
        let fault = faults.iter_mut().find(|f| {
            f.operation == operation
                && f.remaining > 0
                && f.scope.as_deref().is_none_or(|s| s == scope)
        });
        match fault {
            Some(fault) => {
                fault.remaining -= 1;
                debug!(scope, ?operation, error = %fault.error, "Injected provider fault");
                Err(fault.error.clone())
            }
            None => Ok(()),
        }
    }

    fn record(&self, scope: &str, operation: Operation, target: &ResourceId, detail: Option<String>) {
        if let Ok(mut m) = self.mutations.lock() {
            m.push(MutationRecord {
                scope: scope.to_string(),
                operation,
                target: target.clone(),
                detail,
            });
        }
    }

    fn page<T: Clone>(&self, items: &[T], token: Option<PageToken>) -> Result<Page<T>, ProviderError> {
        let offset = match token {
            None => 0,
            Some(PageToken(raw)) => raw
                .parse::<usize>()
                .map_err(|_| ProviderError::bad_request(format!("invalid page token: {raw}")))?,
        };
        let start = offset.min(items.len());
        let end = (start + self.page_size).min(items.len());
        let next = (end < items.len()).then(|| PageToken(end.to_string()));
        Ok(Page {
            items: items[start..end].to_vec(),
            next,
        })
    }
}

/// In-memory client bound to one scope.
#[derive(Debug)]
struct ScopedMemoryClient {
    scope: String,
    inner: Arc<Inner>,
}

impl ScopedMemoryClient {
    fn unknown_scope(&self) -> ProviderError {
        ProviderError::not_found("subscription", &self.scope)
    }
}

#[async_trait]
impl TopologyProvider for ScopedMemoryClient {
    async fn list_networks(
        &self,
        page: Option<PageToken>,
    ) -> Result<Page<Network>, ProviderError> {
        self.inner.enter(&self.scope, Operation::ListNetworks)?;
        let state = self.inner.state.read().await;
        let scope = state.scopes.get(&self.scope).ok_or_else(|| self.unknown_scope())?;
        let networks: Vec<Network> = scope.networks.iter().map(|n| n.network.clone()).collect();
        self.inner.page(&networks, page)
    }

    async fn list_subnets(
        &self,
        network: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Subnet>, ProviderError> {
        self.inner.enter(&self.scope, Operation::ListSubnets)?;
        let state = self.inner.state.read().await;
        let scope = state.scopes.get(&self.scope).ok_or_else(|| self.unknown_scope())?;
        let record = scope
            .network(network)
            .ok_or_else(|| ProviderError::not_found("virtualNetwork", network.as_str()))?;
        self.inner.page(&record.subnets, page)
    }

    async fn list_routes(
        &self,
        route_table: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Route>, ProviderError> {
        self.inner.enter(&self.scope, Operation::ListRoutes)?;
        let state = self.inner.state.read().await;
        let scope = state.scopes.get(&self.scope).ok_or_else(|| self.unknown_scope())?;
        let table = scope
            .route_table(route_table)
            .ok_or_else(|| ProviderError::not_found("routeTable", route_table.as_str()))?;
        self.inner.page(&table.routes, page)
    }

    async fn list_peerings(
        &self,
        network: &ResourceId,
        page: Option<PageToken>,
    ) -> Result<Page<Peering>, ProviderError> {
        self.inner.enter(&self.scope, Operation::ListPeerings)?;
        let state = self.inner.state.read().await;
        let scope = state.scopes.get(&self.scope).ok_or_else(|| self.unknown_scope())?;
        let record = scope
            .network(network)
            .ok_or_else(|| ProviderError::not_found("virtualNetwork", network.as_str()))?;
        self.inner.page(&record.peerings, page)
    }
}

#[async_trait]
impl TopologyMutator for ScopedMemoryClient {
    async fn create_or_update_route(
        &self,
        route_table: &ResourceId,
        route: &Route,
    ) -> Result<(), ProviderError> {
        self.inner.enter(&self.scope, Operation::CreateOrUpdateRoute)?;
        let mut state = self.inner.state.write().await;
        let scope = state.scopes.get_mut(&self.scope).ok_or_else(|| self.unknown_scope())?;
        let table = scope
            .route_table_mut(route_table)
            .ok_or_else(|| ProviderError::not_found("routeTable", route_table.as_str()))?;
        let prefix = route.address_prefix.trim();
        let keeps_prefix = table
            .routes
            .iter()
            .any(|r| r.name.eq_ignore_ascii_case(&route.name) && r.address_prefix.trim() == prefix);
        // Only a write that introduces the prefix is checked, so a table
        // already holding duplicates can still have one repointed.
        if let Some(other) = table.routes.iter().find(|r| {
            !keeps_prefix
                && !r.name.eq_ignore_ascii_case(&route.name)
                && r.address_prefix.trim() == prefix
        }) {
            return Err(ProviderError::conflict(format!(
                "route {} already uses prefix {} in {}",
                other.name,
                route.address_prefix,
                route_table.name()
            )));
        }
        self.inner.record(
            &self.scope,
            Operation::CreateOrUpdateRoute,
            route_table,
            Some(format!(
                "{} {} -> {} {}",
                route.name,
                route.address_prefix,
                route.next_hop_type,
                route.next_hop_ip.as_deref().unwrap_or("-")
            )),
        );
        match table
            .routes
            .iter_mut()
            .find(|r| r.name.eq_ignore_ascii_case(&route.name))
        {
            Some(existing) => *existing = route.clone(),
            None => table.routes.push(route.clone()),
        }
        Ok(())
    }

    async fn delete_route(
        &self,
        route_table: &ResourceId,
        route_name: &str,
    ) -> Result<(), ProviderError> {
        self.inner.enter(&self.scope, Operation::DeleteRoute)?;
        self.inner.record(
            &self.scope,
            Operation::DeleteRoute,
            route_table,
            Some(route_name.to_string()),
        );
        let mut state = self.inner.state.write().await;
        let scope = state.scopes.get_mut(&self.scope).ok_or_else(|| self.unknown_scope())?;
        if let Some(table) = scope.route_table_mut(route_table) {
            table
                .routes
                .retain(|r| !r.name.eq_ignore_ascii_case(route_name));
        }
        Ok(())
    }

    async fn delete_peering(&self, peering: &ResourceId) -> Result<(), ProviderError> {
        self.inner.enter(&self.scope, Operation::DeletePeering)?;
        self.inner
            .record(&self.scope, Operation::DeletePeering, peering, None);
        let mut state = self.inner.state.write().await;
        let scope = state.scopes.get_mut(&self.scope).ok_or_else(|| self.unknown_scope())?;
        for record in &mut scope.networks {
            record.peerings.retain(|p| !p.id.same_resource(peering));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate;
    use crate::types::{NextHopType, PeeringState};
    use futures_util::TryStreamExt;

    const VNET: &str = "/subscriptions/sub-a/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet-a";
    const RT: &str = "/subscriptions/sub-a/resourceGroups/rg/providers/Microsoft.Network/routeTables/rt-a";

    fn snapshot() -> TopologySnapshot {
        let vnet = ResourceId::new(VNET);
        let subnets = (0..5)
            .map(|i| Subnet {
                id: vnet.child("subnets", &format!("s{i}")),
                name: format!("s{i}"),
                address_prefix: format!("10.0.{i}.0/24"),
                route_table: Some(ResourceId::new(RT)),
            })
            .collect();
        let mut scopes = BTreeMap::new();
        scopes.insert(
            "sub-a".to_string(),
            ScopeTopology {
                networks: vec![NetworkRecord {
                    network: Network {
                        id: vnet.clone(),
                        name: "vnet-a".into(),
                        resource_group: "rg".into(),
                        address_space: vec!["10.0.0.0/16".into()],
                    },
                    subnets,
                    peerings: vec![Peering {
                        id: vnet.child("virtualNetworkPeerings", "to-x"),
                        name: "to-x".into(),
                        local_network: vnet.clone(),
                        remote_network: ResourceId::new("/subscriptions/x/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/x"),
                        state: PeeringState::Connected,
                    }],
                }],
                route_tables: vec![RouteTable {
                    id: ResourceId::new(RT),
                    routes: vec![],
                }],
            },
        );
        TopologySnapshot { scopes }
    }


    #[tokio::test]
    async fn test_paged_listing() {
        let topology = InMemoryTopology::with_page_size(snapshot(), 2);
        let client = topology.client_for("sub-a").unwrap();
        let vnet = ResourceId::new(VNET);
        let provider = client.provider().clone();
        let subnets: Vec<Subnet> = paginate(move |page| {
            let provider = provider.clone();
            let vnet = vnet.clone();
            async move { provider.list_subnets(&vnet, page).await }
        })
        .try_collect()
        .await
        .unwrap();
        assert_eq!(subnets.len(), 5);
        assert_eq!(topology.call_count(Operation::ListSubnets), 3);
    }

    #[tokio::test]
    async fn test_unknown_scope_is_not_found() {
        let topology = InMemoryTopology::new(snapshot());
        let client = topology.client_for("sub-missing").unwrap();
        let err = client.provider().list_networks(None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_route_upsert_is_idempotent() {
        let topology = InMemoryTopology::new(snapshot());
        let client = topology.client_for("sub-a").unwrap();
        let route = Route {
            name: "DefaultRoute-To-NVA".into(),
            address_prefix: "0.0.0.0/0".into(),
            next_hop_type: NextHopType::VirtualAppliance,
            next_hop_ip: Some("10.0.0.4".into()),
        };
        let rt = ResourceId::new(RT);
        client.mutator().create_or_update_route(&rt, &route).await.unwrap();
        let first = topology.snapshot().await;
        client.mutator().create_or_update_route(&rt, &route).await.unwrap();
        assert_eq!(first, topology.snapshot().await);
        assert_eq!(first.scopes["sub-a"].route_tables[0].routes.len(), 1);
        assert_eq!(topology.mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_second_route_with_same_prefix_conflicts() {
        let topology = InMemoryTopology::new(snapshot());
        let client = topology.client_for("sub-a").unwrap();
        let rt = ResourceId::new(RT);
        let route = |name: &str, hop: NextHopType, ip: Option<&str>| Route {
            name: name.into(),
            address_prefix: "0.0.0.0/0".into(),
            next_hop_type: hop,
            next_hop_ip: ip.map(Into::into),
        };
        client
            .mutator()
            .create_or_update_route(&rt, &route("legacy", NextHopType::Internet, None))
            .await
            .unwrap();
        topology.clear_mutations();

        let err = client
            .mutator()
            .create_or_update_route(
                &rt,
                &route("DefaultRoute-To-NVA", NextHopType::VirtualAppliance, Some("10.0.0.4")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Conflict { .. }));
        assert!(topology.mutations().is_empty());

        // Repointing the existing route under its own name is fine.
        client
            .mutator()
            .create_or_update_route(&rt, &route("legacy", NextHopType::VirtualAppliance, Some("10.0.0.4")))
            .await
            .unwrap();
        let routes = &topology.snapshot().await.scopes["sub-a"].route_tables[0].routes;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].next_hop_ip.as_deref(), Some("10.0.0.4"));
    }

    #[tokio::test]
    async fn test_delete_peering_twice_succeeds() {
        let topology = InMemoryTopology::new(snapshot());
        let client = topology.client_for("sub-a").unwrap();
        let id = ResourceId::new(VNET).child("virtualNetworkPeerings", "to-x");
        client.mutator().delete_peering(&id).await.unwrap();
        client.mutator().delete_peering(&id).await.unwrap();
        assert!(topology.snapshot().await.scopes["sub-a"].networks[0].peerings.is_empty());
    }

    #[tokio::test]
    async fn test_injected_fault_fires_then_clears() {
        let topology = InMemoryTopology::new(snapshot());
        topology.inject_fault(
            Some("sub-a"),
            Operation::ListNetworks,
            1,
            ProviderError::throttled(None),
        );
        let client = topology.client_for("sub-a").unwrap();
        assert!(client.provider().list_networks(None).await.is_err());
        assert!(client.provider().list_networks(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_snapshot_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        let topology = InMemoryTopology::new(snapshot());
        topology.save(&path).await.unwrap();
        let loaded = InMemoryTopology::load(&path).await.unwrap();
        assert_eq!(loaded.snapshot().await, snapshot());
    }
}
