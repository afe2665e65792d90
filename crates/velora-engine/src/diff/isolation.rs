//! Subnet-to-subnet isolation.
//!
//! A route whose prefix falls inside the network's own address space and
//! whose next hop is anything but the NVA lets subnets talk directly.

use ipnetwork::IpNetwork;
use velora_config::Concern;
use velora_topology::{NextHopType, Network, Route, RouteTable};

use super::DiffContext;
use super::ipam::contains;
use crate::action::Action;
use crate::verdict::{Finding, ResourceKind, Verdict};

/// Whether a route bypasses the NVA for traffic inside `space`.
pub fn bypasses_nva(route: &Route, space: &[IpNetwork]) -> bool {
    if route.is_default_route() || route.next_hop_type == NextHopType::VirtualAppliance {
        return false;
    }
    route
        .address_prefix
        .trim()
        .parse::<IpNetwork>()
        .is_ok_and(|prefix| space.iter().any(|s| contains(s, &prefix)))
}

pub fn diff_route_table(ctx: &DiffContext<'_>, network: &Network, table: &RouteTable) -> Vec<Finding> {
    let concern = Concern::SubnetIsolation;
    let space: Vec<IpNetwork> = network
        .address_space
        .iter()
        .filter_map(|p| p.trim().parse().ok())
        .collect();

    let conflicts: Vec<&Route> = table
        .routes
        .iter()
        .filter(|r| bypasses_nva(r, &space))
        .collect();
    if conflicts.is_empty() {
        return vec![Finding::compliant(&table.id, ResourceKind::RouteTable, concern)];
    }

    let mode = ctx.mode(concern);
    conflicts
        .into_iter()
        .map(|route| {
            let resource = table.id.child("routes", &route.name);
            let mut detail = format!(
                "route {} -> {} bypasses the NVA for {}",
                route.address_prefix, route.next_hop_type, network.name
            );
            let actions = if mode.may_mutate() && ctx.auto_remediation {
                vec![Action::RemoveConflictingRoute {
                    route_table: table.id.clone(),
                    route_name: route.name.clone(),
                }]
            } else {
                if mode.may_mutate() {
                    detail.push_str("; route kept, auto-remediation disabled");
                }
                Vec::new()
            };
            Finding::new(&resource, ResourceKind::Route, concern, Verdict::Drifted)
                .with_detail(detail)
                .with_actions(actions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::diff::fixtures::*;

    fn routes() -> Vec<Route> {
        vec![
            route("default", "0.0.0.0/0", NextHopType::VirtualAppliance, Some("10.0.0.4")),
            route("direct", "10.1.2.0/24", NextHopType::VnetLocal, None),
            route("via-fw", "10.1.3.0/24", NextHopType::VirtualAppliance, Some("10.0.0.4")),
            route("onprem", "192.168.0.0/16", NextHopType::VirtualNetworkGateway, None),
        ]
    }

    #[test]
    fn test_direct_route_removed_with_auto_remediation() {
        let (hub, scope) = (hub(Some("10.0.0.4")), scope(&[]));
        let ctx = DiffContext::with_modes(&scope, &hub, enforce_all, true);
        let vnet = network("vnet-a", &["10.1.0.0/16"]);

        let findings = diff_route_table(&ctx, &vnet, &table("rt-a", routes()));
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, ResourceKind::Route);
        assert!(finding.resource.as_str().ends_with("/routes/direct"));
        assert_eq!(finding.actions.len(), 1);
        assert_eq!(finding.actions[0].kind(), ActionKind::RemoveConflictingRoute);
    }

    #[test]
    fn test_without_auto_remediation_route_is_kept_and_stays_drifted() {
        let (hub, scope) = (hub(Some("10.0.0.4")), scope(&[]));
        let ctx = DiffContext::with_modes(&scope, &hub, enforce_all, false);
        let vnet = network("vnet-a", &["10.1.0.0/16"]);

        let findings = diff_route_table(&ctx, &vnet, &table("rt-a", routes()));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].verdict, Verdict::Drifted);
        assert!(findings[0].actions.is_empty());
        assert!(findings[0].detail.as_deref().unwrap().contains("route kept"));
    }

    #[test]
    fn test_clean_table_is_compliant() {
        let (hub, scope) = (hub(Some("10.0.0.4")), scope(&[]));
        let ctx = DiffContext::with_modes(&scope, &hub, enforce_all, true);
        let vnet = network("vnet-a", &["10.9.0.0/16"]);

        let findings = diff_route_table(&ctx, &vnet, &table("rt-a", routes()));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].verdict, Verdict::Compliant);
        assert_eq!(findings[0].kind, ResourceKind::RouteTable);
    }
}
