//! Hub-and-spoke peering evaluation.
//!
//! A spoke may peer with its hub and nothing else. Missing or broken hub
//! peerings are reported; they are never created or repaired automatically.

use velora_config::Concern;
use velora_topology::{Network, Peering, PeeringState, ResourceId};

use super::DiffContext;
use crate::action::Action;
use crate::verdict::{Finding, ResourceKind, Verdict};

pub fn diff_network(ctx: &DiffContext<'_>, network: &Network, peerings: &[Peering]) -> Vec<Finding> {
    let concern = Concern::Peering;
    if ctx.hub.vnet_id.trim().is_empty() {
        return vec![
            Finding::new(&network.id, ResourceKind::Network, concern, Verdict::Failed)
                .with_detail(format!("hub {} has no network id", ctx.hub.name)),
        ];
    }
    let hub_id = ResourceId::new(ctx.hub.vnet_id.trim());
    let may_mutate = ctx.mode(concern).may_mutate();

    let mut findings = Vec::with_capacity(peerings.len() + 1);
    let mut hub_peered = false;
    for peering in peerings {
        if peering.remote_network.same_resource(&hub_id) {
            hub_peered = true;
            let finding = if peering.state == PeeringState::Connected {
                Finding::compliant(&peering.id, ResourceKind::Peering, concern)
            } else {
                Finding::new(&peering.id, ResourceKind::Peering, concern, Verdict::Drifted)
                    .with_detail(format!(
                        "hub peering is {:?}; not auto-repaired",
                        peering.state
                    ))
            };
            findings.push(finding);
            continue;
        }

        let actions = if may_mutate {
            vec![Action::RemoveUnauthorizedPeering {
                peering: peering.id.clone(),
            }]
        } else {
            Vec::new()
        };
        findings.push(
            Finding::new(&peering.id, ResourceKind::Peering, concern, Verdict::Drifted)
                .with_detail(format!(
                    "unauthorized peering to {}",
                    peering.remote_network
                ))
                .with_actions(actions),
        );
    }

    let network_finding = if ctx.scope.require_hub_peering && !hub_peered {
        Finding::new(&network.id, ResourceKind::Network, concern, Verdict::Drifted)
            .with_detail(format!(
                "required peering to hub {} missing; not auto-created",
                ctx.hub.name
            ))
    } else {
        Finding::compliant(&network.id, ResourceKind::Network, concern)
    };
    findings.push(network_finding);
    findings
}
