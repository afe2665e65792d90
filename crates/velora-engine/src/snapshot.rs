//! Point-in-time view of one network, as fetched for a diff pass.

use velora_topology::{Network, Peering, ResourceId, RouteTable, Subnet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSnapshot {
    pub network: Network,
    pub subnets: Vec<Subnet>,
    pub peerings: Vec<Peering>,
    /// Route tables associated with at least one subnet
    pub route_tables: Vec<RouteTable>,
}

impl NetworkSnapshot {
    pub fn route_table(&self, id: &ResourceId) -> Option<&RouteTable> {
        self.route_tables.iter().find(|t| t.id.same_resource(id))
    }

    /// Distinct route tables referenced by subnets, in subnet order.
    pub fn route_table_ids(&self) -> Vec<ResourceId> {
        route_table_ids(&self.subnets)
    }
}

pub(crate) fn route_table_ids<'s>(subnets: impl IntoIterator<Item = &'s Subnet>) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = Vec::new();
    for id in subnets.into_iter().filter_map(|s| s.route_table.as_ref()) {
        if !ids.iter().any(|seen| seen.same_resource(id)) {
            ids.push(id.clone());
        }
    }
    ids
}
