//! Address space containment checks.

use ipnetwork::IpNetwork;
use velora_config::Concern;
use velora_topology::{Network, Peering, Subnet};

use super::DiffContext;
use crate::action::Action;
use crate::verdict::{Finding, ResourceKind, Verdict};

/// Whether `inner` lies entirely inside `outer`. Mixed families never match.
pub fn contains(outer: &IpNetwork, inner: &IpNetwork) -> bool {
    match (outer, inner) {
        (IpNetwork::V4(o), IpNetwork::V4(i)) => o.prefix() <= i.prefix() && o.contains(i.network()),
        (IpNetwork::V6(o), IpNetwork::V6(i)) => o.prefix() <= i.prefix() && o.contains(i.network()),
        _ => false,
    }
}

/// Containment result of one prefix against the allowed ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixCheck {
    Allowed,
    Outside(String),
    Unparseable(String),
}

pub fn check_prefix(prefix: &str, allowed: &[IpNetwork]) -> PrefixCheck {
    match prefix.trim().parse::<IpNetwork>() {
        Ok(net) if allowed.iter().any(|range| contains(range, &net)) => PrefixCheck::Allowed,
        Ok(_) => PrefixCheck::Outside(prefix.trim().to_string()),
        Err(_) => PrefixCheck::Unparseable(prefix.trim().to_string()),
    }
}

fn describe(bad: &[PrefixCheck]) -> String {
    bad.iter()
        .filter_map(|check| match check {
            PrefixCheck::Allowed => None,
            PrefixCheck::Outside(p) => Some(format!("{p} outside allowed ranges")),
            PrefixCheck::Unparseable(p) => Some(format!("unparseable prefix {p:?}")),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn prefix_of(check: &PrefixCheck) -> Option<&str> {
    match check {
        PrefixCheck::Allowed => None,
        PrefixCheck::Outside(p) | PrefixCheck::Unparseable(p) => Some(p),
    }
}

/// Evaluate the network's address space and every subnet prefix.
///
/// Violations are flagged. With auto-remediation a non-compliant network is
/// additionally cut off from all its peers; subnets are only ever flagged.
pub fn diff_network(
    ctx: &DiffContext<'_>,
    network: &Network,
    subnets: &[Subnet],
    peerings: &[Peering],
) -> Vec<Finding> {
    let concern = Concern::Ipam;
    let allowed = &ctx.scope.allowed_ranges;
    let may_mutate = ctx.mode(concern).may_mutate();
    let mut findings = Vec::new();

    let bad: Vec<PrefixCheck> = network
        .address_space
        .iter()
        .map(|p| check_prefix(p, allowed))
        .filter(|c| *c != PrefixCheck::Allowed)
        .collect();
    if bad.is_empty() {
        findings.push(Finding::compliant(&network.id, ResourceKind::Network, concern));
    } else {
        let mut actions = Vec::new();
        if may_mutate {
            actions.extend(bad.iter().filter_map(prefix_of).map(|p| {
                Action::FlagIpamViolation {
                    resource: network.id.clone(),
                    prefix: p.to_string(),
                }
            }));
            if ctx.auto_remediation {
                actions.extend(peerings.iter().map(|p| Action::IsolateNetwork {
                    network: network.id.clone(),
                    peering: p.id.clone(),
                }));
            }
        }
        findings.push(
            Finding::new(&network.id, ResourceKind::Network, concern, Verdict::Violation)
                .with_detail(describe(&bad))
                .with_actions(actions),
        );
    }

    for subnet in subnets {
        let check = check_prefix(&subnet.address_prefix, allowed);
        if check == PrefixCheck::Allowed {
            findings.push(Finding::compliant(&subnet.id, ResourceKind::Subnet, concern));
            continue;
        }
        let actions = match (may_mutate, prefix_of(&check)) {
            (true, Some(p)) => vec![Action::FlagIpamViolation {
                resource: subnet.id.clone(),
                prefix: p.to_string(),
            }],
            _ => Vec::new(),
        };
        findings.push(
            Finding::new(&subnet.id, ResourceKind::Subnet, concern, Verdict::Violation)
                .with_detail(describe(std::slice::from_ref(&check)))
                .with_actions(actions),
        );
    }
    findings
}
