//! Per-scope reconciliation phases.
//!
//! ```text
//! Pending -> Fetching -> Diffing -> Applying -+
//!               ^                             |
//!               +------ next network batch ---+
//! Fetching -> Done         (no more networks)
//! any non-terminal -> Failed
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePhase {
    Pending,
    Fetching,
    Diffing,
    Applying,
    Done,
    Failed,
}

impl ScopePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_advance_to(self, next: ScopePhase) -> bool {
        use ScopePhase::*;
        match (self, next) {
            (Pending, Fetching)
            | (Fetching, Diffing)
            | (Diffing, Applying)
            | (Applying, Fetching)
            | (Fetching, Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ScopePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Fetching => write!(f, "fetching"),
            Self::Diffing => write!(f, "diffing"),
            Self::Applying => write!(f, "applying"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks one scope's phase and rejects illegal transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    scope: String,
    phase: ScopePhase,
    batches: usize,
}

impl PhaseTracker {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            phase: ScopePhase::Pending,
            batches: 0,
        }
    }

    pub fn phase(&self) -> ScopePhase {
        self.phase
    }

    /// Network batches that reached the diff phase
    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn advance(&mut self, next: ScopePhase) -> EngineResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(EngineError::InvalidTransition {
                scope: self.scope.clone(),
                from: self.phase,
                to: next,
            });
        }
        debug!(scope = %self.scope, from = %self.phase, to = %next, "Scope phase transition");
        if next == ScopePhase::Diffing {
            self.batches += 1;
        }
        self.phase = next;
        Ok(())
    }

    /// Move to `Failed`, returning the phase the failure happened in.
    pub fn fail(&mut self) -> ScopePhase {
        let failed_in = self.phase;
        if !self.phase.is_terminal() {
            self.phase = ScopePhase::Failed;
        }
        failed_in
    }
}
