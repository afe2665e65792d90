//! Turning findings into an ordered, de-duplicated set of mutations.
//!
//! Actions are grouped into lanes. All actions against one route table share
//! a lane and run in priority order; everything else gets a lane of its own.
//! Lanes are independent of each other and may run concurrently.

use std::collections::{BTreeMap, HashSet};

use velora_topology::ResourceId;

use crate::action::Action;
use crate::verdict::Finding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    /// Identity shared by every finding that asked for this mutation
    pub key: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    /// Route table the lane serializes on, if any
    pub route_table: Option<ResourceId>,
    pub steps: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    lanes: Vec<Lane>,
}

impl Plan {
    pub fn build(findings: &[Finding]) -> Self {
        let mut seen = HashSet::new();
        let mut lanes: BTreeMap<String, Lane> = BTreeMap::new();

        for action in findings.iter().flat_map(|f| f.actions.iter()) {
            let key = action.key();
            if !seen.insert(key.clone()) {
                continue;
            }
            let lane_key = match action.route_table() {
                Some(table) => format!("rt:{}", table.key()),
                None => key.clone(),
            };
            lanes
                .entry(lane_key)
                .or_insert_with(|| Lane {
                    route_table: action.route_table().cloned(),
                    steps: Vec::new(),
                })
                .steps
                .push(PlannedAction {
                    key,
                    action: action.clone(),
                });
        }

        let mut lanes: Vec<Lane> = lanes.into_values().collect();
        for lane in &mut lanes {
            lane.steps.sort_by_key(|s| s.action.kind().priority());
        }
        Self { lanes }
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn actions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.lanes.iter().flat_map(|l| l.steps.iter())
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(|l| l.steps.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
