use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;
use velora_config::{Concern, EnforcementMode, Policy};
use velora_engine::{RunReport, ScopeState, Verdict};

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn mode_label(mode: EnforcementMode) -> &'static str {
    match mode {
        EnforcementMode::Enforce => "enforce",
        EnforcementMode::Scan => "scan",
        EnforcementMode::Disabled => "-",
    }
}

pub fn print_policy(policy: &Policy) {
    let mut hubs = Builder::default();
    hubs.push_record(["Hub", "VNet", "Resource group", "NVA next hop"]);
    for hub in policy.hubs() {
        hubs.push_record([
            hub.name.clone(),
            hub.vnet_id.clone(),
            hub.resource_group.clone(),
            hub.nva_next_hop
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", hubs.build().with(Style::rounded()));

    let mut scopes = Builder::default();
    let mut header = vec!["Scope".to_string(), "Hub".to_string(), "Allowed ranges".to_string()];
    header.extend(Concern::ALL.iter().map(Concern::to_string));
    scopes.push_record(header);
    for scope in policy.scopes() {
        let ranges = if scope.allowed_ranges.is_empty() {
            "-".to_string()
        } else {
            scope
                .allowed_ranges
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut row = vec![scope.id.clone(), scope.hub_name.clone(), ranges];
        row.extend(
            Concern::ALL
                .iter()
                .map(|c| mode_label(policy.mode(scope, *c)).to_string()),
        );
        scopes.push_record(row);
    }
    println!("{}", scopes.build().with(Style::rounded()));
}

pub fn print_report(report: &RunReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Table => print_report_table(report),
    }
    Ok(())
}

fn print_report_table(report: &RunReport) {
    let mut entries = Builder::default();
    entries.push_record(["Scope", "Resource", "Kind", "Concern", "Verdict", "Actions", "Detail"]);
    let mut rows = 0;
    for (scope, entry) in report.entries() {
        if entry.verdict == Verdict::Compliant {
            continue;
        }
        rows += 1;
        entries.push_record([
            scope.to_string(),
            entry.resource.name().to_string(),
            entry.kind.to_string(),
            entry.concern.map(|c| c.to_string()).unwrap_or_default(),
            entry.verdict.to_string(),
            entry
                .actions
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            entry.detail.clone().unwrap_or_default(),
        ]);
    }
    if rows > 0 {
        println!("{}", entries.build().with(Style::rounded()));
    }

    let mut scopes = Builder::default();
    scopes.push_record(["Scope", "State", "Failed in", "Error", "Entries"]);
    for (id, scope) in &report.scopes {
        scopes.push_record([
            id.clone(),
            scope.state.to_string(),
            scope.failed_in.map(|p| p.to_string()).unwrap_or_default(),
            scope.error.clone().unwrap_or_default(),
            scope.entries.len().to_string(),
        ]);
    }
    println!("{}", scopes.build().with(Style::rounded()));

    let s = report.summary();
    println!(
        "run {}{}: {} compliant, {} drifted, {} violation, {} remediated, {} failed, {} skipped",
        report.run_id,
        if report.dry_run { " (dry run)" } else { "" },
        s.compliant.to_string().green(),
        s.drifted.to_string().yellow(),
        s.violation.to_string().red(),
        s.remediated.to_string().cyan(),
        s.failed.to_string().red(),
        s.skipped,
    );

    if report.cancelled {
        print_warning("Run was cancelled before all scopes finished");
    }
    let failed_scopes = report
        .scopes
        .values()
        .filter(|s| s.state == ScopeState::Failed)
        .count();
    if failed_scopes > 0 {
        print_error(&format!("{failed_scopes} of {} scope(s) failed", s.scopes));
    } else if s.failed > 0 {
        print_error(&format!("{} action(s) failed", s.failed));
    } else {
        print_success(&format!("{} scope(s) reconciled", s.scopes));
    }
}
