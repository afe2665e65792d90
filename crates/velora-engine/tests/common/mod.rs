#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;

use velora_config::{Policy, PolicyConfig};
use velora_topology::{
    InMemoryTopology, Network, NetworkRecord, NextHopType, Peering, PeeringState, ResourceId,
    Route, RouteTable, ScopeTopology, Subnet, TopologySnapshot,
};

pub const HUB_VNET: &str =
    "/subscriptions/hub/resourceGroups/rg-hub/providers/Microsoft.Network/virtualNetworks/vnet-hub";

pub fn base(scope: &str) -> String {
    format!("/subscriptions/{scope}/resourceGroups/rg-spoke/providers/Microsoft.Network")
}

pub fn network_id(scope: &str, name: &str) -> ResourceId {
    ResourceId::new(format!("{}/virtualNetworks/{name}", base(scope)))
}

pub fn table_id(scope: &str, name: &str) -> ResourceId {
    ResourceId::new(format!("{}/routeTables/{name}", base(scope)))
}

/// Spoke network with `(name, prefix, route table)` subnets and peerings to
/// the given remote network ids.
pub fn network(
    scope: &str,
    name: &str,
    space: &[&str],
    subnets: &[(&str, &str, Option<&str>)],
    remotes: &[&str],
) -> NetworkRecord {
    let id = network_id(scope, name);
    NetworkRecord {
        network: Network {
            id: id.clone(),
            name: name.to_string(),
            resource_group: "rg-spoke".to_string(),
            address_space: space.iter().map(|s| s.to_string()).collect(),
        },
        subnets: subnets
            .iter()
            .map(|(subnet, prefix, table)| Subnet {
                id: id.child("subnets", subnet),
                name: subnet.to_string(),
                address_prefix: prefix.to_string(),
                route_table: table.map(|t| table_id(scope, t)),
            })
            .collect(),
        peerings: remotes
            .iter()
            .enumerate()
            .map(|(i, remote)| Peering {
                id: id.child("virtualNetworkPeerings", &format!("peer-{i}")),
                name: format!("peer-{i}"),
                local_network: id.clone(),
                remote_network: ResourceId::new(*remote),
                state: PeeringState::Connected,
            })
            .collect(),
    }
}

pub fn table(scope: &str, name: &str, routes: Vec<Route>) -> RouteTable {
    RouteTable {
        id: table_id(scope, name),
        routes,
    }
}

pub fn route(name: &str, prefix: &str, hop: NextHopType, ip: Option<&str>) -> Route {
    Route {
        name: name.to_string(),
        address_prefix: prefix.to_string(),
        next_hop_type: hop,
        next_hop_ip: ip.map(str::to_string),
    }
}

pub fn topology(scopes: Vec<(&str, ScopeTopology)>) -> TopologySnapshot {
    TopologySnapshot {
        scopes: scopes
            .into_iter()
            .map(|(id, topo)| (id.to_string(), topo))
            .collect(),
    }
}

/// Policy with a single hub (NVA 10.0.0.4) and fast retries.
pub fn policy(subscriptions: Value, features: Value) -> Arc<Policy> {
    policy_with(subscriptions, features, json!({}))
}

pub fn policy_with(subscriptions: Value, features: Value, reconciler: Value) -> Arc<Policy> {
    let mut reconciler_doc = json!({
        "max_concurrency": 2,
        "network_batch_size": 2,
        "network_concurrency": 2,
        "retry": {"max_attempts": 3, "initial_backoff_ms": 1, "max_backoff_ms": 5, "jitter": 0.0}
    });
    if let (Some(target), Some(overrides)) = (reconciler_doc.as_object_mut(), reconciler.as_object())
    {
        for (k, v) in overrides {
            target.insert(k.clone(), v.clone());
        }
    }
    let doc = json!({
        "hubs": [{
            "name": "hub-weu",
            "vnet_id": HUB_VNET,
            "resource_group": "rg-hub",
            "nva_next_hop": "10.0.0.4"
        }],
        "subscriptions": subscriptions,
        "features": features,
        "reconciler": reconciler_doc
    });
    let config = PolicyConfig::from_json(&doc.to_string()).expect("policy json");
    Arc::new(Policy::from_config(config).expect("valid policy"))
}

pub fn provider(snapshot: TopologySnapshot) -> InMemoryTopology {
    InMemoryTopology::with_page_size(snapshot, 1)
}
