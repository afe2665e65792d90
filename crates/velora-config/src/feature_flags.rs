//! Feature flags deciding how each enforcement concern is treated.
//!
//! A concern is either enforced (drift produces mutating actions), scanned
//! (drift is reported but never acted on) or disabled (not evaluated at all).
//! Scanning is what `compliance_scanning` buys for concerns whose
//! enforcement flag is off.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::FeaturesConfig;

/// A policy concern evaluated by the diff engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    /// Default route through the hub NVA
    Routing,
    /// No direct subnet-to-subnet routes bypassing the NVA
    SubnetIsolation,
    /// Peered with the hub and nothing else
    Peering,
    /// Address space inside the allowed ranges
    Ipam,
}

impl Concern {
    pub const ALL: [Concern; 4] = [
        Concern::Routing,
        Concern::SubnetIsolation,
        Concern::Peering,
        Concern::Ipam,
    ];
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routing => write!(f, "routing"),
            Self::SubnetIsolation => write!(f, "subnet_isolation"),
            Self::Peering => write!(f, "peering"),
            Self::Ipam => write!(f, "ipam"),
        }
    }
}

/// How a concern is handled for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Enforce,
    Scan,
    Disabled,
}

impl EnforcementMode {
    /// Whether the concern is evaluated at all
    pub fn is_evaluated(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether drift may turn into mutating actions
    pub fn may_mutate(self) -> bool {
        matches!(self, Self::Enforce)
    }
}

impl FeaturesConfig {
    /// Check if the global enforcement flag for a concern is set.
    ///
    /// Subnet isolation rides on the routing flag since both mutate route tables.
    pub fn is_enforced(&self, concern: Concern) -> bool {
        match concern {
            Concern::Routing | Concern::SubnetIsolation => self.routing_enforcement,
            Concern::Peering => self.peering_enforcement,
            Concern::Ipam => self.ipam_enforcement,
        }
    }

    /// Resolve the global mode for a concern
    pub fn mode(&self, concern: Concern) -> EnforcementMode {
        if self.is_enforced(concern) {
            EnforcementMode::Enforce
        } else if self.compliance_scanning {
            EnforcementMode::Scan
        } else {
            EnforcementMode::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enforced_flag_wins() {
        let features = FeaturesConfig {
            routing_enforcement: true,
            compliance_scanning: true,
            ..Default::default()
        };
        assert_eq!(features.mode(Concern::Routing), EnforcementMode::Enforce);
        assert_eq!(
            features.mode(Concern::SubnetIsolation),
            EnforcementMode::Enforce
        );
        assert_eq!(features.mode(Concern::Peering), EnforcementMode::Scan);
    }

    #[test]
    fn test_disabled_without_scanning() {
        let features = FeaturesConfig::default();
        for concern in Concern::ALL {
            assert_eq!(features.mode(concern), EnforcementMode::Disabled);
            assert!(!features.mode(concern).is_evaluated());
        }
    }

    #[test]
    fn test_mode_predicates() {
        assert!(EnforcementMode::Enforce.may_mutate());
        assert!(!EnforcementMode::Scan.may_mutate());
        assert!(EnforcementMode::Scan.is_evaluated());
    }
}
