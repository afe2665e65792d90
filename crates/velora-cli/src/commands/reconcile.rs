use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use velora_config::Policy;
use velora_engine::Reconciler;
use velora_topology::InMemoryTopology;

use super::{EXIT_CONFIG, exit_code};
use crate::cli::ReconcileArgs;
use crate::output::{print_error, print_report};

pub async fn reconcile(mut policy: Policy, args: &ReconcileArgs) -> Result<i32> {
    if !args.scopes.is_empty()
        && let Err(e) = policy.retain_scopes(&args.scopes)
    {
        print_error(&e.to_string());
        return Ok(EXIT_CONFIG);
    }

    let topology = InMemoryTopology::load(&args.topology)
        .await
        .with_context(|| format!("failed to load topology {}", args.topology.display()))?;

    let mut settings = policy.reconciler.clone();
    settings.dry_run |= args.dry_run;
    if let Some(n) = args.max_concurrency {
        settings.max_concurrency = n.max(1);
    }
    if let Some(secs) = args.timeout {
        settings.timeout = Some(Duration::from_secs(secs));
    }

    let reconciler =
        Reconciler::new(Arc::new(policy), Arc::new(topology.clone())).with_settings(settings);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let report = reconciler.run(cancel).await;
    interrupt.abort();

    if let Some(path) = &args.write_topology {
        topology
            .save(path)
            .await
            .with_context(|| format!("failed to write topology {}", path.display()))?;
        info!(path = %path.display(), "Topology written");
    }

    print_report(&report, args.format)?;
    Ok(exit_code(&report))
}
