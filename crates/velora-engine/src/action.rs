//! Planned mutations.
//!
//! Actions are derived on every run and never persisted. Each one carries
//! the full desired payload so re-applying it converges to the same state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use velora_topology::{DEFAULT_ROUTE_PREFIX, NextHopType, ResourceId, Route};

/// Reserved name of the route Velora owns in every managed route table.
pub const DEFAULT_ROUTE_NAME: &str = "DefaultRoute-To-NVA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateOrUpdateDefaultRoute,
    RemoveConflictingRoute,
    RemoveUnauthorizedPeering,
    IsolateNetwork,
    FlagIpamViolation,
}

impl ActionKind {
    /// Application order within one lane; the default route always goes first
    /// so traffic is never left without an NVA-bound route.
    pub fn priority(self) -> u8 {
        match self {
            Self::CreateOrUpdateDefaultRoute => 0,
            Self::RemoveConflictingRoute => 1,
            Self::RemoveUnauthorizedPeering => 2,
            Self::IsolateNetwork => 3,
            Self::FlagIpamViolation => 4,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateOrUpdateDefaultRoute => write!(f, "create_or_update_default_route"),
            Self::RemoveConflictingRoute => write!(f, "remove_conflicting_route"),
            Self::RemoveUnauthorizedPeering => write!(f, "remove_unauthorized_peering"),
            Self::IsolateNetwork => write!(f, "isolate_network"),
            Self::FlagIpamViolation => write!(f, "flag_ipam_violation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    CreateOrUpdateDefaultRoute {
        route_table: ResourceId,
        route: Route,
    },
    RemoveConflictingRoute {
        route_table: ResourceId,
        route_name: String,
    },
    RemoveUnauthorizedPeering {
        peering: ResourceId,
    },
    /// Cut one peering of a network whose address space breaks IPAM policy
    IsolateNetwork {
        network: ResourceId,
        peering: ResourceId,
    },
    /// Report-only; performs no mutation
    FlagIpamViolation {
        resource: ResourceId,
        prefix: String,
    },
}

impl Action {
    /// Ensure the table's default route points at `nva`.
    pub fn default_route(route_table: &ResourceId, nva: IpAddr) -> Self {
        Self::default_route_named(route_table, DEFAULT_ROUTE_NAME, nva)
    }

    /// Point the default route stored under `name` at `nva`.
    ///
    /// Used to repoint an existing default route in place, since a provider
    /// rejects a second `0.0.0.0/0` entry under another name.
    pub fn default_route_named(route_table: &ResourceId, name: &str, nva: IpAddr) -> Self {
        Self::CreateOrUpdateDefaultRoute {
            route_table: route_table.clone(),
            route: Route {
                name: name.to_string(),
                address_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
                next_hop_type: NextHopType::VirtualAppliance,
                next_hop_ip: Some(nva.to_string()),
            },
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateOrUpdateDefaultRoute { .. } => ActionKind::CreateOrUpdateDefaultRoute,
            Self::RemoveConflictingRoute { .. } => ActionKind::RemoveConflictingRoute,
            Self::RemoveUnauthorizedPeering { .. } => ActionKind::RemoveUnauthorizedPeering,
            Self::IsolateNetwork { .. } => ActionKind::IsolateNetwork,
            Self::FlagIpamViolation { .. } => ActionKind::FlagIpamViolation,
        }
    }

    /// Identity of the mutation; two actions with the same key are one mutation.
    pub fn key(&self) -> String {
        match self {
            Self::CreateOrUpdateDefaultRoute { route_table, route } => {
                format!("route:{}:{}", route_table.key(), route.name.to_ascii_lowercase())
            }
            Self::RemoveConflictingRoute {
                route_table,
                route_name,
            } => format!(
                "route:{}:{}",
                route_table.key(),
                route_name.to_ascii_lowercase()
            ),
            Self::RemoveUnauthorizedPeering { peering } | Self::IsolateNetwork { peering, .. } => {
                format!("peering:{}", peering.key())
            }
            Self::FlagIpamViolation { resource, prefix } => {
                format!("flag:{}:{prefix}", resource.key())
            }
        }
    }

    /// Route table this action mutates, if any
    pub fn route_table(&self) -> Option<&ResourceId> {
        match self {
            Self::CreateOrUpdateDefaultRoute { route_table, .. }
            | Self::RemoveConflictingRoute { route_table, .. } => Some(route_table),
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::FlagIpamViolation { .. })
    }

    /// Resource the action operates on
    pub fn target(&self) -> &ResourceId {
        match self {
            Self::CreateOrUpdateDefaultRoute { route_table, .. }
            | Self::RemoveConflictingRoute { route_table, .. } => route_table,
            Self::RemoveUnauthorizedPeering { peering } | Self::IsolateNetwork { peering, .. } => {
                peering
            }
            Self::FlagIpamViolation { resource, .. } => resource,
        }
    }
}
