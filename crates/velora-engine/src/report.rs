//! Run reports.
//!
//! A [`RunReport`] maps every scope of the run to its terminal state and the
//! ordered list of entries its workers produced. Workers never share a
//! mutable report: each one writes its own slot exactly once through the
//! [`ReportAccumulator`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;
use time::OffsetDateTime;
use uuid::Uuid;

use velora_config::Concern;
use velora_topology::ResourceId;

use crate::action::{Action, ActionKind};
use crate::error::{EngineError, EngineResult};
use crate::executor::Outcome;
use crate::phase::ScopePhase;
use crate::verdict::{Finding, ResourceKind, Verdict};

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub resource: ResourceId,
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concern: Option<Concern>,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<Finding> for ReportEntry {
    fn from(finding: Finding) -> Self {
        Self {
            resource: finding.resource,
            kind: finding.kind,
            concern: Some(finding.concern),
            verdict: finding.verdict,
            actions: finding.actions.iter().map(Action::kind).collect(),
            detail: finding.detail,
        }
    }
}

impl ReportEntry {
    /// Turn a finding into an entry, folding in what happened to its actions.
    ///
    /// Any failed action fails the entry. All actions applied (flags count
    /// as applied once something was mutated) remediates it. Anything else
    /// keeps the diff verdict.
    pub fn resolve(finding: Finding, outcomes: &HashMap<String, Outcome>) -> Self {
        let results: Vec<&Outcome> = finding
            .actions
            .iter()
            .filter_map(|a| outcomes.get(&a.key()))
            .collect();
        let complete = !finding.actions.is_empty() && results.len() == finding.actions.len();
        let mut entry = Self::from(finding);

        let failed = results.iter().find_map(|o| match o {
            Outcome::Failed { error } => Some(error),
            _ => None,
        });
        let skipped = results.iter().find_map(|o| match o {
            Outcome::NotAttempted { reason } => Some(reason),
            _ => None,
        });

        if let Some(error) = failed {
            entry.verdict = Verdict::Failed;
            entry.append_detail(format!("apply failed ({}): {error}", error.category()));
        } else if let Some(reason) = skipped {
            entry.append_detail(format!("not applied: {reason}"));
        } else if results.iter().any(|o| matches!(o, Outcome::Planned)) {
            entry.append_detail("dry run");
        } else if complete && results.iter().any(|o| matches!(o, Outcome::Applied)) {
            entry.verdict = Verdict::Remediated;
        }
        entry
    }

    /// Entry for a resource that could not be evaluated at all.
    pub fn failure(resource: &ResourceId, kind: ResourceKind, detail: impl Into<String>) -> Self {
        Self {
            resource: resource.clone(),
            kind,
            concern: None,
            verdict: Verdict::Failed,
            actions: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    fn append_detail(&mut self, extra: impl Into<String>) {
        let extra = extra.into();
        self.detail = Some(match self.detail.take() {
            Some(d) => format!("{d}; {extra}"),
            None => extra,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeState {
    Done,
    Failed,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub scope: String,
    pub state: ScopeState,
    /// Phase the scope was in when it failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_in: Option<ScopePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub entries: Vec<ReportEntry>,
}

impl ScopeReport {
    pub fn done(scope: impl Into<String>, entries: Vec<ReportEntry>) -> Self {
        Self {
            scope: scope.into(),
            state: ScopeState::Done,
            failed_in: None,
            error: None,
            entries,
        }
    }

    pub fn failed(
        scope: impl Into<String>,
        failed_in: ScopePhase,
        error: impl Into<String>,
        entries: Vec<ReportEntry>,
    ) -> Self {
        Self {
            scope: scope.into(),
            state: ScopeState::Failed,
            failed_in: Some(failed_in),
            error: Some(error.into()),
            entries,
        }
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.entries.iter().filter(|e| e.verdict == verdict).count()
    }

    pub fn has_drift(&self) -> bool {
        self.entries.iter().any(|e| e.verdict.is_drift())
    }
}

/// Aggregate counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub scopes: usize,
    pub scopes_done: usize,
    pub scopes_failed: usize,
    pub compliant: usize,
    pub drifted: usize,
    pub violation: usize,
    pub remediated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    fn add(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Compliant => self.compliant += 1,
            Verdict::Drifted => self.drifted += 1,
            Verdict::Violation => self.violation += 1,
            Verdict::Remediated => self.remediated += 1,
            Verdict::Failed => self.failed += 1,
            Verdict::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub dry_run: bool,
    /// Whether the run was cancelled or hit its deadline
    pub cancelled: bool,
    pub scopes: BTreeMap<String, ScopeReport>,
}

impl RunReport {
    pub fn scope(&self, id: &str) -> Option<&ScopeReport> {
        self.scopes.get(id)
    }

    /// True when every scope reached `Done`.
    pub fn succeeded(&self) -> bool {
        self.scopes.values().all(|s| s.state == ScopeState::Done)
    }

    /// True when any resource still differs from policy.
    pub fn has_drift(&self) -> bool {
        self.scopes.values().any(ScopeReport::has_drift)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ReportEntry)> {
        self.scopes
            .values()
            .flat_map(|s| s.entries.iter().map(move |e| (s.scope.as_str(), e)))
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            scopes: self.scopes.len(),
            ..Default::default()
        };
        for scope in self.scopes.values() {
            match scope.state {
                ScopeState::Done => summary.scopes_done += 1,
                ScopeState::Failed => summary.scopes_failed += 1,
            }
            for entry in &scope.entries {
                summary.add(entry.verdict);
            }
        }
        summary
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Write-once slots, one per scope of the run.
#[derive(Debug)]
pub struct ReportAccumulator {
    slots: BTreeMap<String, OnceLock<ScopeReport>>,
}

impl ReportAccumulator {
    pub fn new(scopes: impl IntoIterator<Item = String>) -> Self {
        Self {
            slots: scopes.into_iter().map(|s| (s, OnceLock::new())).collect(),
        }
    }

    /// Store a scope's report. A second write for the same scope is rejected.
    pub fn record(&self, report: ScopeReport) -> EngineResult<()> {
        let scope = report.scope.clone();
        let slot = self
            .slots
            .get(&scope)
            .ok_or_else(|| EngineError::UnknownScope {
                scope: scope.clone(),
            })?;
        slot.set(report)
            .map_err(|_| EngineError::SlotTaken { scope })
    }

    /// Assemble the final report. Scopes whose worker never reported are failed.
    pub fn finish(
        &self,
        run_id: Uuid,
        started_at: OffsetDateTime,
        dry_run: bool,
        cancelled: bool,
    ) -> RunReport {
        let scopes = self
            .slots
            .iter()
            .map(|(id, slot)| {
                let report = slot.get().cloned().unwrap_or_else(|| {
                    ScopeReport::failed(
                        id.clone(),
                        ScopePhase::Pending,
                        "scope worker did not report",
                        Vec::new(),
                    )
                });
                (id.clone(), report)
            })
            .collect();
        RunReport {
            run_id,
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            dry_run,
            cancelled,
            scopes,
        }
    }
}
