mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use velora_config::Concern;
use velora_engine::{ActionKind, DEFAULT_ROUTE_NAME, Reconciler, ResourceKind, ScopeState, Verdict};
use velora_topology::{NextHopType, Operation, ScopeTopology};

fn routing_scope() -> serde_json::Value {
    json!({
        "sub-a": {
            "allowed_cidrs": ["10.1.0.0/16"],
            "hub_name": "hub-weu",
            "require_hub_peering": true,
            "require_nva_routing": true
        }
    })
}

fn spoke_a() -> ScopeTopology {
    ScopeTopology {
        networks: vec![network(
            "sub-a",
            "vnet-a",
            &["10.1.0.0/16"],
            &[
                ("app", "10.1.1.0/24", Some("rt-a")),
                ("db", "10.1.2.0/24", Some("rt-a")),
            ],
            &[HUB_VNET],
        )],
        route_tables: vec![table("sub-a", "rt-a", vec![])],
    }
}

#[tokio::test]
async fn missing_default_route_is_remediated_once_then_compliant() {
    let policy = policy(
        routing_scope(),
        json!({"routing_enforcement": true, "peering_enforcement": true}),
    );
    let topo = provider(topology(vec![("sub-a", spoke_a())]));
    let reconciler = Reconciler::new(policy, Arc::new(topo.clone()));

    let report = reconciler.run(CancellationToken::new()).await;
    assert!(report.succeeded());
    let scope = report.scope("sub-a").unwrap();
    assert_eq!(scope.state, ScopeState::Done);

    let subnets: Vec<_> = scope
        .entries
        .iter()
        .filter(|e| e.kind == ResourceKind::Subnet && e.concern == Some(Concern::Routing))
        .collect();
    assert_eq!(subnets.len(), 2);
    for entry in &subnets {
        assert_eq!(entry.verdict, Verdict::Remediated);
        assert_eq!(entry.actions, vec![ActionKind::CreateOrUpdateDefaultRoute]);
    }

    // Two subnets share the table: one mutation.
    let mutations = topo.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].operation, Operation::CreateOrUpdateRoute);

    let after_first = topo.snapshot().await;
    let rt = after_first.scopes["sub-a"]
        .route_table(&table_id("sub-a", "rt-a"))
        .unwrap();
    assert_eq!(rt.routes.len(), 1);
    assert_eq!(rt.routes[0].name, DEFAULT_ROUTE_NAME);
    assert_eq!(rt.routes[0].next_hop_type, NextHopType::VirtualAppliance);
    assert_eq!(rt.routes[0].next_hop_ip.as_deref(), Some("10.0.0.4"));

    // Second run converges to no actions and leaves the topology untouched.
    topo.clear_mutations();
    let report = reconciler.run(CancellationToken::new()).await;
    assert!(topo.mutations().is_empty());
    assert!(!report.has_drift());
    assert_eq!(topo.snapshot().await, after_first);
    let scope = report.scope("sub-a").unwrap();
    assert!(
        scope
            .entries
            .iter()
            .filter(|e| e.concern == Some(Concern::Routing) && e.kind == ResourceKind::Subnet)
            .all(|e| e.verdict == Verdict::Compliant)
    );
}

#[tokio::test]
async fn out_of_range_subnet_is_flagged_without_mutation() {
    let policy = policy(
        json!({"sub-a": {"allowed_cidrs": ["10.0.0.0/16"], "hub_name": "hub-weu"}}),
        json!({"ipam_enforcement": true, "auto_remediation": true}),
    );
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.0.0.0/16"],
                &[("rogue", "10.1.0.0/24", None)],
                &[],
            )],
            route_tables: vec![],
        },
    )]);
    let topo = provider(snapshot.clone());

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;

    let entry = report
        .entries()
        .map(|(_, e)| e)
        .find(|e| e.kind == ResourceKind::Subnet && e.concern == Some(Concern::Ipam))
        .unwrap();
    assert_eq!(entry.verdict, Verdict::Violation);
    assert_eq!(entry.actions, vec![ActionKind::FlagIpamViolation]);
    assert!(topo.mutations().is_empty());
    assert_eq!(topo.snapshot().await, snapshot);
    assert!(report.has_drift());
}

#[tokio::test]
async fn reserved_and_unassociated_subnets_are_skipped() {
    let policy = policy(routing_scope(), json!({"routing_enforcement": true}));
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.1.0.0/16"],
                &[
                    ("GatewaySubnet", "10.1.0.0/27", Some("rt-gw")),
                    ("loose", "10.1.5.0/24", None),
                ],
                &[HUB_VNET],
            )],
            route_tables: vec![table("sub-a", "rt-gw", vec![])],
        },
    )]);
    let topo = provider(snapshot);

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;

    let subnets: Vec<_> = report
        .entries()
        .map(|(_, e)| e)
        .filter(|e| e.kind == ResourceKind::Subnet)
        .collect();
    assert_eq!(subnets.len(), 2);
    assert!(subnets.iter().all(|e| e.verdict == Verdict::Skipped));
    assert!(topo.mutations().is_empty());
}

#[tokio::test]
async fn unauthorized_peering_removed_and_hub_peering_kept() {
    let policy = policy(routing_scope(), json!({"peering_enforcement": true}));
    let other = network_id("sub-b", "vnet-b");
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.1.0.0/16"],
                &[],
                &[HUB_VNET, other.as_str()],
            )],
            route_tables: vec![],
        },
    )]);
    let topo = provider(snapshot);

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;
    assert!(report.succeeded());

    let mutations = topo.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].operation, Operation::DeletePeering);

    let state = topo.snapshot().await;
    let vnet = state.scopes["sub-a"]
        .network(&network_id("sub-a", "vnet-a"))
        .unwrap();
    assert_eq!(vnet.peerings.len(), 1);
    assert!(
        vnet.peerings[0]
            .remote_network
            .same_resource(&velora_topology::ResourceId::new(HUB_VNET))
    );

    let removed = report
        .entries()
        .map(|(_, e)| e)
        .find(|e| e.actions.contains(&ActionKind::RemoveUnauthorizedPeering))
        .unwrap();
    assert_eq!(removed.verdict, Verdict::Remediated);
}

#[tokio::test]
async fn default_route_is_ensured_before_conflicting_routes_are_removed() {
    let policy = policy(
        json!({"sub-a": {
            "hub_name": "hub-weu",
            "require_nva_routing": true,
            "subnet_to_subnet_deny": true
        }}),
        json!({"routing_enforcement": true, "auto_remediation": true}),
    );
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.1.0.0/16"],
                &[("app", "10.1.1.0/24", Some("rt-a"))],
                &[HUB_VNET],
            )],
            route_tables: vec![table(
                "sub-a",
                "rt-a",
                vec![
                    route("legacy-default", "0.0.0.0/0", NextHopType::Internet, None),
                    route("direct", "10.1.2.0/24", NextHopType::VnetLocal, None),
                ],
            )],
        },
    )]);
    let topo = provider(snapshot);

    let reconciler = Reconciler::new(policy, Arc::new(topo.clone()));

    let report = reconciler.run(CancellationToken::new()).await;
    assert!(report.succeeded());

    let ops: Vec<(Operation, Option<String>)> = topo
        .mutations()
        .into_iter()
        .map(|m| (m.operation, m.detail))
        .collect();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].0, Operation::CreateOrUpdateRoute);
    assert!(ops[0].1.as_deref().unwrap().starts_with("legacy-default 0.0.0.0/0"));
    assert_eq!(ops[1], (Operation::DeleteRoute, Some("direct".to_string())));

    let state = topo.snapshot().await;
    let rt = state.scopes["sub-a"]
        .route_table(&table_id("sub-a", "rt-a"))
        .unwrap();
    assert_eq!(rt.routes.len(), 1);
    assert_eq!(rt.routes[0].name, "legacy-default");
    assert_eq!(rt.routes[0].next_hop_type, NextHopType::VirtualAppliance);
    assert_eq!(rt.routes[0].next_hop_ip.as_deref(), Some("10.0.0.4"));

    // The repointed route is compliant under its existing name.
    topo.clear_mutations();
    let second = reconciler.run(CancellationToken::new()).await;
    assert!(!second.has_drift());
    assert!(topo.mutations().is_empty());
}

fn isolation_scope() -> serde_json::Value {
    json!({"sub-a": {
        "hub_name": "hub-weu",
        "require_nva_routing": true,
        "subnet_to_subnet_deny": true
    }})
}

#[tokio::test]
async fn manual_mode_repoints_default_route_but_deletes_nothing() {
    let policy = policy(
        isolation_scope(),
        json!({"routing_enforcement": true, "auto_remediation": false}),
    );
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.1.0.0/16"],
                &[("app", "10.1.1.0/24", Some("rt-a"))],
                &[HUB_VNET],
            )],
            route_tables: vec![table(
                "sub-a",
                "rt-a",
                vec![
                    route("legacy-default", "0.0.0.0/0", NextHopType::Internet, None),
                    route("older-default", "0.0.0.0/0", NextHopType::Internet, None),
                    route("direct", "10.1.2.0/24", NextHopType::VnetLocal, None),
                ],
            )],
        },
    )]);
    let topo = provider(snapshot);

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;
    assert!(report.succeeded());

    let ops: Vec<Operation> = topo.mutations().into_iter().map(|m| m.operation).collect();
    assert_eq!(ops, vec![Operation::CreateOrUpdateRoute]);

    let state = topo.snapshot().await;
    let rt = state.scopes["sub-a"]
        .route_table(&table_id("sub-a", "rt-a"))
        .unwrap();
    let names: Vec<&str> = rt.routes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["legacy-default", "older-default", "direct"]);
    assert_eq!(rt.routes[0].next_hop_ip.as_deref(), Some("10.0.0.4"));

    // The bypass route is kept and still reported as drift.
    let bypass = report
        .entries()
        .map(|(_, e)| e)
        .find(|e| e.concern == Some(Concern::SubnetIsolation) && e.kind == ResourceKind::Route)
        .unwrap();
    assert_eq!(bypass.verdict, Verdict::Drifted);
    assert!(bypass.actions.is_empty());
    assert!(bypass.detail.as_deref().unwrap().contains("route kept"));

    let subnet = report
        .entries()
        .map(|(_, e)| e)
        .find(|e| e.concern == Some(Concern::Routing) && e.kind == ResourceKind::Subnet)
        .unwrap();
    assert_eq!(subnet.verdict, Verdict::Remediated);
    assert!(subnet.detail.as_deref().unwrap().contains("older-default kept"));
    assert!(report.has_drift());
}

#[tokio::test]
async fn isolation_leaves_tables_of_reserved_subnets_alone() {
    let policy = policy(
        isolation_scope(),
        json!({"routing_enforcement": true, "auto_remediation": true}),
    );
    let snapshot = topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network(
                "sub-a",
                "vnet-a",
                &["10.1.0.0/16"],
                &[("GatewaySubnet", "10.1.0.0/27", Some("rt-gw"))],
                &[HUB_VNET],
            )],
            route_tables: vec![table(
                "sub-a",
                "rt-gw",
                vec![route("to-app", "10.1.1.0/24", NextHopType::VnetLocal, None)],
            )],
        },
    )]);
    let topo = provider(snapshot.clone());

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;
    assert!(report.succeeded());
    assert!(topo.mutations().is_empty());
    assert_eq!(topo.snapshot().await, snapshot);

    let gw = report
        .entries()
        .map(|(_, e)| e)
        .find(|e| e.concern == Some(Concern::SubnetIsolation))
        .unwrap();
    assert!(gw.resource.same_resource(&table_id("sub-a", "rt-gw")));
    assert_eq!(gw.verdict, Verdict::Skipped);
}

#[tokio::test]
async fn compliance_scan_reports_drift_without_mutating() {
    let policy = policy(routing_scope(), json!({"compliance_scanning": true}));
    let topo = provider(topology(vec![("sub-a", spoke_a())]));

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;

    assert!(report.succeeded());
    assert!(report.has_drift());
    assert!(topo.mutations().is_empty());
    assert!(report.entries().all(|(_, e)| e.actions.is_empty()));
}

#[tokio::test]
async fn dry_run_plans_but_never_mutates() {
    let policy = policy_with(
        routing_scope(),
        json!({"routing_enforcement": true}),
        json!({"dry_run": true}),
    );
    let snapshot = topology(vec![("sub-a", spoke_a())]);
    let topo = provider(snapshot.clone());

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;

    assert!(report.dry_run);
    assert!(topo.mutations().is_empty());
    assert_eq!(topo.snapshot().await, snapshot);
    let drifted: Vec<_> = report
        .entries()
        .map(|(_, e)| e)
        .filter(|e| e.verdict == Verdict::Drifted)
        .collect();
    assert_eq!(drifted.len(), 2);
    assert!(drifted.iter().all(|e| e.detail.as_deref().unwrap().contains("dry run")));
}

#[tokio::test]
async fn every_network_is_visited_across_batches() {
    let policy = policy(
        json!({"sub-a": {"hub_name": "hub-weu", "require_nva_routing": true}}),
        json!({"routing_enforcement": true}),
    );
    let names = ["v1", "v2", "v3", "v4", "v5"];
    let networks = names
        .iter()
        .map(|n| {
            let table = format!("rt-{n}");
            network(
                "sub-a",
                n,
                &["10.1.0.0/16"],
                &[("app", "10.1.1.0/24", Some(table.as_str()))],
                &[],
            )
        })
        .collect();
    let route_tables = names
        .iter()
        .map(|n| table("sub-a", &format!("rt-{n}"), vec![]))
        .collect();
    let topo = provider(topology(vec![(
        "sub-a",
        ScopeTopology {
            networks,
            route_tables,
        },
    )]));

    let report = Reconciler::new(policy, Arc::new(topo.clone()))
        .run(CancellationToken::new())
        .await;

    let remediated = report
        .entries()
        .filter(|(_, e)| e.verdict == Verdict::Remediated)
        .count();
    assert_eq!(remediated, 5);
    assert_eq!(topo.mutations().len(), 5);
}

#[tokio::test]
async fn disabled_concerns_are_reported_as_skipped_once_per_scope() {
    let policy = policy(
        json!({"sub-a": {"hub_name": "hub-weu"}}),
        json!({"peering_enforcement": true}),
    );
    let topo = provider(topology(vec![(
        "sub-a",
        ScopeTopology {
            networks: vec![network("sub-a", "vnet-a", &["10.1.0.0/16"], &[], &[HUB_VNET])],
            route_tables: vec![],
        },
    )]));

    let report = Reconciler::new(policy, Arc::new(topo))
        .run(CancellationToken::new())
        .await;

    let scope_entries: Vec<_> = report
        .entries()
        .map(|(_, e)| e)
        .filter(|e| e.kind == ResourceKind::Scope)
        .collect();
    assert_eq!(scope_entries.len(), 3);
    assert!(scope_entries.iter().all(|e| e.verdict == Verdict::Skipped));
    assert!(
        !scope_entries
            .iter()
            .any(|e| e.concern == Some(Concern::Peering))
    );
}
