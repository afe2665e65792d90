//! # velora-engine
//!
//! Reconciliation engine for Velora hub-and-spoke network policy.
//!
//! A run fans out over the policy's scopes. For each scope the engine
//! streams networks in batches, fetches their topology, diffs it against the
//! policy and applies the resulting actions:
//!
//! ```text
//! Policy + ClientFactory
//!        │
//!        ▼
//!   Reconciler ──(semaphore)──> ScopeWorker per scope
//!                                  │
//!              Fetcher ──> diff ──> Plan ──> ActionExecutor
//!                                  │
//!                                  ▼
//!                           ReportAccumulator ──> RunReport
//! ```
//!
//! The diff engine is pure; all provider I/O goes through
//! [`velora_topology`] traits.

pub mod action;
pub mod diff;
mod error;
pub mod executor;
pub mod fetch;
pub mod locks;
pub mod phase;
pub mod plan;
pub mod reconciler;
pub mod report;
pub mod retry;
pub mod snapshot;
pub mod verdict;

pub use action::{Action, ActionKind, DEFAULT_ROUTE_NAME};
pub use diff::{DiffContext, diff_network};
pub use error::{EngineError, EngineResult};
pub use executor::{ActionExecutor, Outcome};
pub use locks::RouteTableLocks;
pub use phase::ScopePhase;
pub use plan::Plan;
pub use reconciler::Reconciler;
pub use report::{ReportEntry, RunReport, ScopeReport, ScopeState, Summary};
pub use retry::RetryPolicy;
pub use snapshot::NetworkSnapshot;
pub use verdict::{Finding, ResourceKind, Verdict};
