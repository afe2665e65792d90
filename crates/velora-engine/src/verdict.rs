//! Per-resource verdicts produced by the diff engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use velora_config::Concern;
use velora_topology::ResourceId;

use crate::action::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Matches policy; no action
    Compliant,
    /// Differs from policy; actions produced but not (yet) applied
    Drifted,
    /// Policy breach that is reported rather than repaired
    Violation,
    /// Actions were applied successfully
    Remediated,
    /// Evaluation or application failed
    Failed,
    /// Not evaluated (ineligible, unassociated, or concern disabled)
    Skipped,
}

impl Verdict {
    /// Whether the resource still differs from policy
    pub fn is_drift(self) -> bool {
        matches!(self, Self::Drifted | Self::Violation)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compliant => write!(f, "compliant"),
            Self::Drifted => write!(f, "drifted"),
            Self::Violation => write!(f, "violation"),
            Self::Remediated => write!(f, "remediated"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Scope,
    Network,
    Subnet,
    RouteTable,
    Route,
    Peering,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope => write!(f, "scope"),
            Self::Network => write!(f, "network"),
            Self::Subnet => write!(f, "subnet"),
            Self::RouteTable => write!(f, "route_table"),
            Self::Route => write!(f, "route"),
            Self::Peering => write!(f, "peering"),
        }
    }
}

/// Outcome of evaluating one concern against one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub resource: ResourceId,
    pub kind: ResourceKind,
    pub concern: Concern,
    pub verdict: Verdict,
    pub actions: Vec<Action>,
    pub detail: Option<String>,
}

impl Finding {
    pub fn new(resource: &ResourceId, kind: ResourceKind, concern: Concern, verdict: Verdict) -> Self {
        Self {
            resource: resource.clone(),
            kind,
            concern,
            verdict,
            actions: Vec::new(),
            detail: None,
        }
    }

    pub fn compliant(resource: &ResourceId, kind: ResourceKind, concern: Concern) -> Self {
        Self::new(resource, kind, concern, Verdict::Compliant)
    }

    pub fn skipped(
        resource: &ResourceId,
        kind: ResourceKind,
        concern: Concern,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(resource, kind, concern, Verdict::Skipped).with_detail(reason)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }
}
