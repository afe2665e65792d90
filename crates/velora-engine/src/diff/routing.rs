//! Default-route-via-NVA evaluation.

use std::net::IpAddr;

use tracing::warn;
use velora_config::Concern;
use velora_topology::{NextHopType, Route, RouteTable, Subnet};

use super::DiffContext;
use crate::action::{Action, DEFAULT_ROUTE_NAME};
use crate::verdict::{Finding, ResourceKind, Verdict};

/// Platform subnets whose routing must never be touched.
pub const RESERVED_SUBNETS: [&str; 5] = [
    "GatewaySubnet",
    "AzureFirewallSubnet",
    "AzureFirewallManagementSubnet",
    "AzureBastionSubnet",
    "RouteServerSubnet",
];

pub fn is_reserved_subnet(name: &str) -> bool {
    RESERVED_SUBNETS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
}

/// Whether a route sends traffic to the given NVA.
pub fn points_at(route: &Route, nva: IpAddr) -> bool {
    route.next_hop_type == NextHopType::VirtualAppliance
        && route
            .next_hop_ip
            .as_deref()
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
            == Some(nva)
}

/// Default routes of a table, reduced in provider order.
///
/// The first default route wins; any further ones are a provider anomaly
/// that is reported but never used for the verdict.
#[derive(Debug, Default)]
pub struct DefaultRouteScan<'a> {
    pub first: Option<&'a Route>,
    pub duplicates: Vec<&'a Route>,
}

impl<'a> DefaultRouteScan<'a> {
    pub fn over(routes: &'a [Route]) -> Self {
        routes
            .iter()
            .filter(|r| r.is_default_route())
            .fold(Self::default(), |mut scan, route| {
                if scan.first.is_none() {
                    scan.first = Some(route);
                } else {
                    scan.duplicates.push(route);
                }
                scan
            })
    }

    pub fn all(&self) -> impl Iterator<Item = &'a Route> + '_ {
        self.first.into_iter().chain(self.duplicates.iter().copied())
    }

    pub fn is_compliant(&self, nva: IpAddr) -> bool {
        self.first.is_some_and(|r| points_at(r, nva))
    }
}

/// Evaluate the routing concern for one subnet.
///
/// `table` is the fetched route table the subnet is associated with, if any.
pub fn diff_subnet(ctx: &DiffContext<'_>, subnet: &Subnet, table: Option<&RouteTable>) -> Finding {
    let concern = Concern::Routing;
    if is_reserved_subnet(&subnet.name) {
        return Finding::skipped(&subnet.id, ResourceKind::Subnet, concern, "reserved subnet");
    }
    let Some(table_id) = &subnet.route_table else {
        warn!(
            scope = %ctx.scope.id,
            subnet = %subnet.id,
            "Subnet has no route table associated, not auto-remediated"
        );
        return Finding::skipped(
            &subnet.id,
            ResourceKind::Subnet,
            concern,
            "no route table associated; not auto-remediated",
        );
    };
    let Some(table) = table else {
        return Finding::new(&subnet.id, ResourceKind::Subnet, concern, Verdict::Failed)
            .with_detail(format!("route table {table_id} missing from snapshot"));
    };
    let Some(nva) = ctx.nva() else {
        return Finding::new(&subnet.id, ResourceKind::Subnet, concern, Verdict::Failed)
            .with_detail(format!("no NVA next hop defined for hub {}", ctx.hub.name));
    };

    let scan = DefaultRouteScan::over(&table.routes);
    if !scan.duplicates.is_empty() {
        warn!(
            route_table = %table.id,
            duplicates = scan.duplicates.len(),
            "Route table has more than one default route"
        );
    }

    if scan.is_compliant(nva) {
        let finding = Finding::compliant(&subnet.id, ResourceKind::Subnet, concern);
        return match scan.duplicates.len() {
            0 => finding,
            n => finding.with_detail(format!("{n} duplicate default route(s) ignored")),
        };
    }

    let mut detail = match scan.first {
        None => format!("no default route in {}", table.id.name()),
        Some(r) => format!(
            "default route {} -> {} {} does not point at NVA {nva}",
            r.name,
            r.next_hop_type,
            r.next_hop_ip.as_deref().unwrap_or("-"),
        ),
    };
    if !ctx.mode(concern).may_mutate() {
        return Finding::new(&subnet.id, ResourceKind::Subnet, concern, Verdict::Drifted)
            .with_detail(detail);
    }

    // An existing default route is repointed in place; the reserved name is
    // only used when the table has none.
    let name = scan.first.map_or(DEFAULT_ROUTE_NAME, |r| r.name.as_str());
    let mut actions = vec![Action::default_route_named(&table.id, name, nva)];
    if !scan.duplicates.is_empty() {
        if ctx.auto_remediation {
            actions.extend(scan.duplicates.iter().map(|r| Action::RemoveConflictingRoute {
                route_table: table.id.clone(),
                route_name: r.name.clone(),
            }));
        } else {
            let names: Vec<&str> = scan.duplicates.iter().map(|r| r.name.as_str()).collect();
            detail.push_str(&format!(
                "; duplicate default route(s) {} kept, auto-remediation disabled",
                names.join(", ")
            ));
        }
    }
    Finding::new(&subnet.id, ResourceKind::Subnet, concern, Verdict::Drifted)
        .with_detail(detail)
        .with_actions(actions)
}
