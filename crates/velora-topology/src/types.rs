//! Topology entity types.
//!
//! Entities are plain values fetched fresh on every run. Relationships are
//! expressed through [`ResourceId`]s, never object references: a subnet
//! names its route table, a peering names both of its networks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::ResourceId;

/// The only prefix treated as a default route.
pub const DEFAULT_ROUTE_PREFIX: &str = "0.0.0.0/0";

/// A discovered virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub resource_group: String,
    /// Address space prefixes as reported by the provider
    #[serde(default)]
    pub address_space: Vec<String>,
}

/// A subnet of a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: ResourceId,
    pub name: String,
    pub address_prefix: String,
    /// Associated route table; absence is valid but flagged
    #[serde(default)]
    pub route_table: Option<ResourceId>,
}

/// Route next hop kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NextHopType {
    VirtualAppliance,
    Internet,
    None,
    VirtualNetworkGateway,
    VnetLocal,
    Other(String),
}

impl NextHopType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::VirtualAppliance => "VirtualAppliance",
            Self::Internet => "Internet",
            Self::None => "None",
            Self::VirtualNetworkGateway => "VirtualNetworkGateway",
            Self::VnetLocal => "VnetLocal",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for NextHopType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "virtualappliance" => Self::VirtualAppliance,
            "internet" => Self::Internet,
            "none" => Self::None,
            "virtualnetworkgateway" => Self::VirtualNetworkGateway,
            "vnetlocal" => Self::VnetLocal,
            _ => Self::Other(value),
        }
    }
}

impl From<NextHopType> for String {
    fn from(value: NextHopType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NextHopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route inside a route table. Prefixes are unique within a table under
/// normal provider semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub address_prefix: String,
    pub next_hop_type: NextHopType,
    /// Only meaningful for `VirtualAppliance`
    #[serde(default)]
    pub next_hop_ip: Option<String>,
}

impl Route {
    pub fn is_default_route(&self) -> bool {
        self.address_prefix.trim() == DEFAULT_ROUTE_PREFIX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PeeringState {
    Initiated,
    #[default]
    Connected,
    Disconnected,
}

/// Directed peering edge from `local_network` to `remote_network`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peering {
    pub id: ResourceId,
    pub name: String,
    pub local_network: ResourceId,
    pub remote_network: ResourceId,
    #[serde(default)]
    pub state: PeeringState,
}

impl Peering {
    /// Edge key of this peering: (source network, target network)
    pub fn edge(&self) -> (String, String) {
        (self.local_network.key(), self.remote_network.key())
    }
}

/// Opaque continuation token handed back by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(pub String);

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present when more pages follow
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_hop_type_roundtrip_names() {
        let parsed: NextHopType = serde_json::from_str("\"virtualappliance\"").unwrap();
        assert_eq!(parsed, NextHopType::VirtualAppliance);
        assert_eq!(
            serde_json::to_string(&NextHopType::VnetLocal).unwrap(),
            "\"VnetLocal\""
        );
        let other: NextHopType = serde_json::from_str("\"HyperNetGateway\"").unwrap();
        assert_eq!(other.as_str(), "HyperNetGateway");
    }

    #[test]
    fn test_default_route_detection() {
        let route = Route {
            name: "r".into(),
            address_prefix: " 0.0.0.0/0".into(),
            next_hop_type: NextHopType::Internet,
            next_hop_ip: None,
        };
        assert!(route.is_default_route());
    }
}
