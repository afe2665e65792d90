//! Raw configuration document.
//!
//! These types mirror the on-disk shape one to one and carry no semantic
//! guarantees. [`crate::Policy::from_config`] turns them into the validated
//! model the engine consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub hubs: Vec<HubConfig>,
    /// Scope id (subscription id) to its enforcement settings
    #[serde(default)]
    pub subscriptions: BTreeMap<String, ScopeConfig>,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PolicyConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::parse(format!("JSON parse error: {e}")))
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::parse(format!("TOML parse error: {e}")))
    }
}

/// A hub network that spokes must peer with and route through.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HubConfig {
    pub name: String,
    #[serde(default, alias = "vnetId")]
    pub vnet_id: String,
    #[serde(default, alias = "resourceGroup")]
    pub resource_group: String,
    /// Address of the NVA (or its load balancer front end)
    #[serde(default, alias = "nvaNextHop")]
    pub nva_next_hop: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScopeConfig {
    #[serde(default, alias = "allowedCIDRs")]
    pub allowed_cidrs: Vec<String>,
    #[serde(alias = "hubName")]
    pub hub_name: String,
    #[serde(default, alias = "requireHubPeering")]
    pub require_hub_peering: bool,
    #[serde(default, alias = "requireNVARouting")]
    pub require_nva_routing: bool,
    #[serde(default, alias = "subnetToSubnetDeny")]
    pub subnet_to_subnet_deny: bool,
}

/// Global feature switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FeaturesConfig {
    #[serde(default, alias = "ipamEnforcement")]
    pub ipam_enforcement: bool,
    #[serde(default, alias = "routingEnforcement")]
    pub routing_enforcement: bool,
    #[serde(default, alias = "peeringEnforcement")]
    pub peering_enforcement: bool,
    /// Evaluate concerns whose enforcement is off and report their drift
    #[serde(default, alias = "complianceScanning")]
    pub compliance_scanning: bool,
    #[serde(default, alias = "autoRemediation")]
    pub auto_remediation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Scopes reconciled in parallel
    #[serde(default = "default_max_concurrency", alias = "maxConcurrency")]
    pub max_concurrency: usize,
    /// Networks fetched, diffed and applied together within one scope
    #[serde(default = "default_network_batch_size", alias = "networkBatchSize")]
    pub network_batch_size: usize,
    /// Topology fetches in flight per scope
    #[serde(default = "default_network_concurrency", alias = "networkConcurrency")]
    pub network_concurrency: usize,
    /// Whole-run deadline; unset means no deadline
    #[serde(default, alias = "timeoutSecs")]
    pub timeout_secs: Option<u64>,
    /// Plan only, never mutate
    #[serde(default, alias = "dryRun")]
    pub dry_run: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            network_batch_size: default_network_batch_size(),
            network_concurrency: default_network_concurrency(),
            timeout_secs: None,
            dry_run: false,
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

fn default_network_batch_size() -> usize {
    16
}

fn default_network_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts", alias = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms", alias = "initialBackoffMs")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms", alias = "maxBackoffMs")]
    pub max_backoff_ms: u64,
    /// Fraction of each delay randomised, 0.0..=1.0
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
