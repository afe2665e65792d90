//! Pure diff engine.
//!
//! Compares a fetched [`NetworkSnapshot`] against the policy and returns one
//! [`Finding`] per evaluated (resource, concern) pair. Nothing in here talks
//! to a provider; the same inputs always produce the same findings.
//!
//! ```text
//! NetworkSnapshot ──┬─> routing    (per subnet)
//!                   ├─> isolation  (per route table)
//!                   ├─> peering    (per peering + network)
//!                   └─> ipam       (per network + subnet)
//! ```

pub mod ipam;
pub mod isolation;
pub mod peering;
pub mod routing;

use std::net::IpAddr;

use velora_config::{Concern, EnforcementMode, Hub, Policy, Scope};
use velora_topology::{ResourceId, RouteTable, Subnet};

use crate::error::{EngineError, EngineResult};
use crate::snapshot::{NetworkSnapshot, route_table_ids};
use crate::verdict::{Finding, ResourceKind, Verdict};

/// Everything the diff functions need to know about one scope.
#[derive(Debug, Clone)]
pub struct DiffContext<'a> {
    pub scope: &'a Scope,
    pub hub: &'a Hub,
    pub auto_remediation: bool,
    modes: [EnforcementMode; 4],
}

impl<'a> DiffContext<'a> {
    pub fn new(policy: &Policy, scope: &'a Scope, hub: &'a Hub) -> Self {
        Self {
            scope,
            hub,
            auto_remediation: policy.features.auto_remediation,
            modes: Concern::ALL.map(|c| policy.mode(scope, c)),
        }
    }

    /// Build a context with explicit modes, mostly for tests and what-if runs.
    pub fn with_modes(
        scope: &'a Scope,
        hub: &'a Hub,
        modes: impl Fn(Concern) -> EnforcementMode,
        auto_remediation: bool,
    ) -> Self {
        Self {
            scope,
            hub,
            auto_remediation,
            modes: Concern::ALL.map(modes),
        }
    }

    pub fn mode(&self, concern: Concern) -> EnforcementMode {
        let idx = Concern::ALL
            .iter()
            .position(|c| *c == concern)
            .unwrap_or_default();
        self.modes[idx]
    }

    pub fn nva(&self) -> Option<IpAddr> {
        self.hub.nva_next_hop
    }

    /// Fail fast when a route-table concern is evaluated but the hub has no
    /// NVA next hop to route through.
    pub fn check_nva(&self) -> EngineResult<()> {
        let needs_nva = [Concern::Routing, Concern::SubnetIsolation]
            .into_iter()
            .any(|c| self.mode(c).is_evaluated());
        if needs_nva && self.nva().is_none() {
            return Err(EngineError::MissingNvaNextHop {
                hub: self.hub.name.clone(),
            });
        }
        Ok(())
    }

    /// Whether a network is the hub itself
    pub fn is_hub_network(&self, network: &ResourceId) -> bool {
        !self.hub.vnet_id.is_empty() && network.same_resource(&ResourceId::new(&self.hub.vnet_id))
    }

    /// Whether route-table fetching is needed at all
    pub fn needs_route_tables(&self) -> bool {
        self.mode(Concern::Routing).is_evaluated()
            || self.mode(Concern::SubnetIsolation).is_evaluated()
    }
}

/// Resource id standing for a whole scope.
pub fn scope_resource(scope: &str) -> ResourceId {
    ResourceId::new(format!("/subscriptions/{scope}"))
}

/// One skipped finding per concern that is not evaluated for this scope.
pub fn skipped_concerns(ctx: &DiffContext<'_>) -> Vec<Finding> {
    let resource = scope_resource(&ctx.scope.id);
    Concern::ALL
        .into_iter()
        .filter(|c| !ctx.mode(*c).is_evaluated())
        .map(|concern| {
            let reason = match concern {
                Concern::Ipam if ctx.scope.allowed_ranges.is_empty() => {
                    "no allowed ranges configured"
                }
                c if !ctx.scope.opts_into(c) => "not required for this scope",
                _ => "disabled by feature flags",
            };
            Finding::skipped(&resource, ResourceKind::Scope, concern, reason)
        })
        .collect()
}

/// Evaluate every enabled concern against one network.
pub fn diff_network(ctx: &DiffContext<'_>, snapshot: &NetworkSnapshot) -> Vec<Finding> {
    let network = &snapshot.network;
    let evaluated: Vec<Concern> = Concern::ALL
        .into_iter()
        .filter(|c| ctx.mode(*c).is_evaluated())
        .collect();

    if ctx.is_hub_network(&network.id) {
        return evaluated
            .into_iter()
            .map(|c| Finding::skipped(&network.id, ResourceKind::Network, c, "hub network"))
            .collect();
    }

    let mut findings = Vec::new();
    for concern in evaluated {
        match concern {
            Concern::Routing => findings.extend(
                snapshot
                    .subnets
                    .iter()
                    .map(|s| routing::diff_subnet(ctx, s, lookup_table(snapshot, s))),
            ),
            Concern::SubnetIsolation => {
                let managed = route_table_ids(
                    snapshot
                        .subnets
                        .iter()
                        .filter(|s| !routing::is_reserved_subnet(&s.name)),
                );
                for id in snapshot.route_table_ids() {
                    if !managed.iter().any(|m| m.same_resource(&id)) {
                        findings.push(Finding::skipped(
                            &id,
                            ResourceKind::RouteTable,
                            concern,
                            "used only by reserved subnets",
                        ));
                        continue;
                    }
                    match snapshot.route_table(&id) {
                        Some(table) => {
                            findings.extend(isolation::diff_route_table(ctx, network, table))
                        }
                        None => findings.push(
                            Finding::new(&id, ResourceKind::RouteTable, concern, Verdict::Failed)
                                .with_detail("route table missing from snapshot"),
                        ),
                    }
                }
            }
            Concern::Peering => {
                findings.extend(peering::diff_network(ctx, network, &snapshot.peerings))
            }
            Concern::Ipam => findings.extend(ipam::diff_network(
                ctx,
                network,
                &snapshot.subnets,
                &snapshot.peerings,
            )),
        }
    }
    findings
}

fn lookup_table<'s>(snapshot: &'s NetworkSnapshot, subnet: &Subnet) -> Option<&'s RouteTable> {
    subnet
        .route_table
        .as_ref()
        .and_then(|id| snapshot.route_table(id))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use velora_config::{Concern, EnforcementMode, Hub, Scope};
    use velora_topology::{
        Network, NextHopType, Peering, PeeringState, ResourceId, Route, RouteTable, Subnet,
    };

    pub const SUB: &str = "/subscriptions/sub-a/resourceGroups/rg-spoke/providers/Microsoft.Network";
    pub const HUB_VNET: &str =
        "/subscriptions/hub/resourceGroups/rg-hub/providers/Microsoft.Network/virtualNetworks/vnet-hub";

    pub fn hub(nva: Option<&str>) -> Hub {
        Hub {
            name: "hub-weu".to_string(),
            vnet_id: HUB_VNET.to_string(),
            resource_group: "rg-hub".to_string(),
            nva_next_hop: nva.map(|ip| ip.parse().unwrap()),
        }
    }

    pub fn scope(ranges: &[&str]) -> Scope {
        Scope {
            id: "sub-a".to_string(),
            hub_name: "hub-weu".to_string(),
            allowed_ranges: ranges.iter().map(|r| r.parse().unwrap()).collect(),
            require_hub_peering: true,
            require_nva_routing: true,
            subnet_to_subnet_deny: true,
        }
    }

    pub fn enforce_all(_: Concern) -> EnforcementMode {
        EnforcementMode::Enforce
    }

    pub fn network(name: &str, space: &[&str]) -> Network {
        Network {
            id: ResourceId::new(format!("{SUB}/virtualNetworks/{name}")),
            name: name.to_string(),
            resource_group: "rg-spoke".to_string(),
            address_space: space.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn table_id(name: &str) -> ResourceId {
        ResourceId::new(format!("{SUB}/routeTables/{name}"))
    }

    pub fn subnet(network: &Network, name: &str, prefix: &str, table: Option<&str>) -> Subnet {
        Subnet {
            id: network.id.child("subnets", name),
            name: name.to_string(),
            address_prefix: prefix.to_string(),
            route_table: table.map(table_id),
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

    pub fn table(name: &str, routes: Vec<Route>) -> RouteTable {
        RouteTable {
            id: table_id(name),
            routes,
        }
    }

    pub fn peering(local: &Network, name: &str, remote: &str) -> Peering {
        Peering {
            id: local.id.child("virtualNetworkPeerings", name),
            name: name.to_string(),
            local_network: local.id.clone(),
            remote_network: ResourceId::new(remote),
            state: PeeringState::Connected,
        }
    }
}
