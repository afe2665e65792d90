//! Scope fan-out and the per-scope reconciliation loop.
//!
//! Each scope runs as its own task, bounded by a semaphore. A scope streams
//! its networks in batches; every batch is fetched, diffed and applied before
//! the next one is pulled, so memory stays proportional to the batch size.
//! One scope failing never stops the others.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;
use velora_config::{Policy, ReconcilerSettings};
use velora_topology::{ClientFactory, Network, ScopedClient};

use crate::diff::{DiffContext, diff_network, skipped_concerns};
use crate::error::{EngineError, EngineResult};
use crate::executor::ActionExecutor;
use crate::fetch::Fetcher;
use crate::locks::RouteTableLocks;
use crate::phase::{PhaseTracker, ScopePhase};
use crate::plan::Plan;
use crate::report::{ReportAccumulator, ReportEntry, RunReport, ScopeReport};
use crate::retry::RetryPolicy;
use crate::snapshot::NetworkSnapshot;
use crate::verdict::Finding;

/// Drives one reconciliation run across every scope of a policy.
pub struct Reconciler {
    policy: Arc<Policy>,
    factory: Arc<dyn ClientFactory>,
    settings: ReconcilerSettings,
    locks: RouteTableLocks,
}

impl Reconciler {
    pub fn new(policy: Arc<Policy>, factory: Arc<dyn ClientFactory>) -> Self {
        let settings = policy.reconciler.clone();
        Self {
            policy,
            factory,
            settings,
            locks: RouteTableLocks::new(),
        }
    }

    /// Override the settings taken from the policy.
    pub fn with_settings(mut self, settings: ReconcilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    /// Reconcile every scope and return the run report.
    ///
    /// Cancelling `cancel` (or reaching the configured timeout) stops new
    /// scopes and batches from starting; in-flight mutations finish.
    pub async fn run(&self, cancel: CancellationToken) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = OffsetDateTime::now_utc();
        let cancel = cancel.child_token();
        let scopes = self.policy.scopes();

        info!(
            %run_id,
            scopes = scopes.len(),
            max_concurrency = self.settings.max_concurrency,
            dry_run = self.settings.dry_run,
            "Starting reconciliation run"
        );

        let deadline = self.settings.timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Run deadline reached, cancelling");
                cancel.cancel();
            })
        });

        let accumulator = Arc::new(ReportAccumulator::new(
            scopes.iter().map(|s| s.id.clone()),
        ));
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let executor = Arc::new(
            ActionExecutor::new(RetryPolicy::from(&self.settings.retry), self.locks.clone())
                .with_dry_run(self.settings.dry_run),
        );

        let mut tasks = JoinSet::new();
        for scope in scopes {
            let worker = ScopeWorker {
                policy: self.policy.clone(),
                factory: self.factory.clone(),
                executor: executor.clone(),
                settings: self.settings.clone(),
                scope_id: scope.id.clone(),
                cancel: cancel.clone(),
            };
            let semaphore = semaphore.clone();
            let accumulator = accumulator.clone();
            let span = info_span!("scope", scope = %scope.id, %run_id);
            tasks.spawn(
                async move {
                    let permit = tokio::select! {
                        biased;
                        _ = worker.cancel.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    };
                    let report = match permit {
                        Some(_permit) => worker.run().await,
                        None => ScopeReport::failed(
                            worker.scope_id.clone(),
                            ScopePhase::Pending,
                            "cancelled before start",
                            Vec::new(),
                        ),
                    };
                    if let Err(e) = accumulator.record(report) {
                        error!(error = %e, "Failed to record scope report");
                    }
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Scope worker terminated unexpectedly");
            }
        }
        if let Some(handle) = deadline {
            handle.abort();
        }

        let report = accumulator.finish(
            run_id,
            started_at,
            self.settings.dry_run,
            cancel.is_cancelled(),
        );
        let summary = report.summary();
        info!(
            %run_id,
            scopes_done = summary.scopes_done,
            scopes_failed = summary.scopes_failed,
            compliant = summary.compliant,
            drifted = summary.drifted,
            violation = summary.violation,
            remediated = summary.remediated,
            failed = summary.failed,
            "Reconciliation run finished"
        );
        report
    }
}

struct ScopeWorker {
    policy: Arc<Policy>,
    factory: Arc<dyn ClientFactory>,
    executor: Arc<ActionExecutor>,
    settings: ReconcilerSettings,
    scope_id: String,
    cancel: CancellationToken,
}

impl ScopeWorker {
    async fn run(self) -> ScopeReport {
        let mut tracker = PhaseTracker::new(&self.scope_id);
        let mut entries = Vec::new();

        match self.reconcile(&mut tracker, &mut entries).await {
            Ok(()) => {
                info!(entries = entries.len(), batches = tracker.batches(), "Scope reconciled");
                ScopeReport::done(self.scope_id, entries)
            }
            Err(err) => {
                let failed_in = tracker.fail();
                if let Some((resource, kind)) = err.resource() {
                    entries.push(ReportEntry::failure(resource, kind, err.to_string()));
                }
                if err.is_cancelled() {
                    warn!(phase = %failed_in, "Scope cancelled");
                } else {
                    error!(phase = %failed_in, error = %err, "Scope reconciliation failed");
                }
                ScopeReport::failed(self.scope_id, failed_in, err.to_string(), entries)
            }
        }
    }

    async fn reconcile(
        &self,
        tracker: &mut PhaseTracker,
        entries: &mut Vec<ReportEntry>,
    ) -> EngineResult<()> {
        let scope = self
            .policy
            .scope(&self.scope_id)
            .ok_or_else(|| EngineError::UnknownScope {
                scope: self.scope_id.clone(),
            })?;
        let hub = self
            .policy
            .hub_for(scope)
            .ok_or_else(|| EngineError::HubUnresolved {
                scope: scope.id.clone(),
                hub: scope.hub_name.clone(),
            })?;
        let ctx = DiffContext::new(&self.policy, scope, hub);
        ctx.check_nva()?;
        entries.extend(skipped_concerns(&ctx).into_iter().map(ReportEntry::from));

        let retry = RetryPolicy::from(&self.settings.retry);
        let client = self.connect(&retry).await?;
        let fetcher = Fetcher::new(client.clone(), retry, self.cancel.clone());
        let with_route_tables = ctx.needs_route_tables();
        let mut batches = fetcher
            .networks()
            .chunks(self.settings.network_batch_size.max(1));
        let network_concurrency = self.settings.network_concurrency.max(1);

        loop {
            tracker.advance(ScopePhase::Fetching)?;
            if self.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let Some(batch) = batches.next().await else {
                break;
            };
            let networks: Vec<Network> = batch.into_iter().collect::<EngineResult<_>>()?;
            debug!(networks = networks.len(), "Fetching network batch");
            let snapshots: Vec<NetworkSnapshot> = stream::iter(networks)
                .map(|network| fetcher.network(network, with_route_tables))
                .buffered(network_concurrency)
                .try_collect()
                .await?;

            tracker.advance(ScopePhase::Diffing)?;
            let findings: Vec<Finding> = snapshots
                .iter()
                .flat_map(|snapshot| diff_network(&ctx, snapshot))
                .collect();

            tracker.advance(ScopePhase::Applying)?;
            let plan = Plan::build(&findings);
            let outcomes = if plan.is_empty() {
                HashMap::new()
            } else {
                debug!(actions = plan.len(), lanes = plan.lanes().len(), "Applying plan");
                self.executor
                    .apply_plan(&client, &plan, network_concurrency, &self.cancel)
                    .await
            };
            entries.extend(
                findings
                    .into_iter()
                    .map(|finding| ReportEntry::resolve(finding, &outcomes)),
            );
        }

        tracker.advance(ScopePhase::Done)?;
        Ok(())
    }

    async fn connect(&self, retry: &RetryPolicy) -> EngineResult<ScopedClient> {
        retry
            .run("connect", &self.cancel, || {
                std::future::ready(self.factory.client_for(&self.scope_id))
            })
            .await
            .map_err(|source| EngineError::Client {
                scope: self.scope_id.clone(),
                source,
            })
    }
}
