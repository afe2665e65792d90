//! Applies planned actions through a scoped client.
//!
//! Every mutation runs under the retry policy. Route-table lanes hold the
//! table lock for the whole lane, retries included, so two workers can never
//! interleave writes to one table.

use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use velora_topology::{ProviderError, ScopedClient};

use crate::action::Action;
use crate::locks::RouteTableLocks;
use crate::plan::{Lane, Plan};
use crate::retry::RetryPolicy;

/// Result of applying one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mutation call succeeded
    Applied,
    /// Report-only action; nothing was called
    Flagged,
    /// Dry run; nothing was called
    Planned,
    /// Deliberately not started
    NotAttempted { reason: String },
    Failed { error: ProviderError },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    retry: RetryPolicy,
    locks: RouteTableLocks,
    dry_run: bool,
}

impl ActionExecutor {
    pub fn new(retry: RetryPolicy, locks: RouteTableLocks) -> Self {
        Self {
            retry,
            locks,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply a single action, taking its route-table lock if it has one.
    #[cfg(test)]
    pub(crate) async fn apply(
        &self,
        client: &ScopedClient,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Outcome {
        let _guard = match action.route_table() {
            Some(table) if action.is_mutation() && !self.dry_run => {
                Some(self.locks.lock(table).await)
            }
            _ => None,
        };
        self.apply_unlocked(client, action, cancel).await
    }

    /// Apply a lane in order. Once a route-table step fails the rest of the
    /// lane is not attempted, so removals never run without the default route.
    pub async fn apply_lane(
        &self,
        client: &ScopedClient,
        lane: &Lane,
        cancel: &CancellationToken,
    ) -> Vec<(String, Outcome)> {
        let _guard = match &lane.route_table {
            Some(table) if !self.dry_run => Some(self.locks.lock(table).await),
            _ => None,
        };

        let mut outcomes = Vec::with_capacity(lane.steps.len());
        let mut blocked: Option<String> = None;
        for step in &lane.steps {
            let outcome = match &blocked {
                Some(reason) => Outcome::NotAttempted {
                    reason: reason.clone(),
                },
                None => self.apply_unlocked(client, &step.action, cancel).await,
            };
            if outcome.is_failed()
                && let Some(table) = &lane.route_table
            {
                blocked = Some(format!("earlier action on {} failed", table.name()));
            }
            outcomes.push((step.key.clone(), outcome));
        }
        outcomes
    }

    /// Apply a whole plan, running up to `concurrency` lanes at once.
    pub async fn apply_plan(
        &self,
        client: &ScopedClient,
        plan: &Plan,
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> HashMap<String, Outcome> {
        let lanes: Vec<_> = plan
            .lanes()
            .iter()
            .map(|lane| self.apply_lane(client, lane, cancel))
            .collect();
        let results: Vec<Vec<(String, Outcome)>> = stream::iter(lanes)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.into_iter().flatten().collect()
    }

    async fn apply_unlocked(
        &self,
        client: &ScopedClient,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Outcome {
        let scope = client.scope();
        let kind = action.kind();
        let target = action.target();

        if !action.is_mutation() {
            info!(scope, action = %kind, target = %target, "Flagged policy violation");
            return Outcome::Flagged;
        }
        if self.dry_run {
            info!(scope, action = %kind, target = %target, "Dry run, action not applied");
            return Outcome::Planned;
        }
        if cancel.is_cancelled() {
            debug!(scope, action = %kind, target = %target, "Run cancelled, action not started");
            return Outcome::NotAttempted {
                reason: "cancelled".to_string(),
            };
        }

        // Once started, a mutation runs its retries to the end so cancellation
        // never abandons it half-applied.
        let in_flight = CancellationToken::new();
        let mutator = client.mutator();
        let result = self
            .retry
            .run(&kind.to_string(), &in_flight, || async move {
                match action {
                    Action::CreateOrUpdateDefaultRoute { route_table, route } => {
                        mutator.create_or_update_route(route_table, route).await
                    }
                    Action::RemoveConflictingRoute {
                        route_table,
                        route_name,
                    } => mutator.delete_route(route_table, route_name).await,
                    Action::RemoveUnauthorizedPeering { peering }
                    | Action::IsolateNetwork { peering, .. } => {
                        mutator.delete_peering(peering).await
                    }
                    Action::FlagIpamViolation { .. } => Ok(()),
                }
            })
            .await;

        match result {
            Ok(()) => {
                info!(scope, action = %kind, target = %target, "Applied action");
                Outcome::Applied
            }
            Err(error) => {
                warn!(
                    scope,
                    action = %kind,
                    target = %target,
                    category = %error.category(),
                    error = %error,
                    "Failed to apply action"
                );
                Outcome::Failed { error }
            }
        }
    }
}
