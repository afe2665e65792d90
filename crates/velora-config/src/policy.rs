//! Validated policy model.
//!
//! [`Policy`] is built once per run from a [`PolicyConfig`] and is read-only
//! afterwards, so it can be shared freely between scope workers.

use ipnetwork::IpNetwork;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;

use crate::feature_flags::{Concern, EnforcementMode};
use crate::model::{FeaturesConfig, LoggingConfig, PolicyConfig, ReconcilerConfig, RetryConfig};
use crate::{ConfigError, Result};

const VALID_LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// The trusted central network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hub {
    pub name: String,
    /// Provider resource id of the hub network
    pub vnet_id: String,
    pub resource_group: String,
    /// Required default-route next hop for every enforced spoke
    pub nva_next_hop: Option<IpAddr>,
}

/// One unit of reconciliation (a subscription).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub id: String,
    /// Name of the assigned hub; resolved through [`Policy::hub`]
    pub hub_name: String,
    pub allowed_ranges: Vec<IpNetwork>,
    pub require_hub_peering: bool,
    pub require_nva_routing: bool,
    pub subnet_to_subnet_deny: bool,
}

impl Scope {
    /// Whether this scope opts into a concern, independent of global flags.
    pub fn opts_into(&self, concern: Concern) -> bool {
        match concern {
            Concern::Routing => self.require_nva_routing,
            Concern::SubnetIsolation => self.subnet_to_subnet_deny,
            Concern::Peering => true,
            Concern::Ipam => !self.allowed_ranges.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetrySettings {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            jitter: cfg.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    pub max_concurrency: usize,
    pub network_batch_size: usize,
    pub network_concurrency: usize,
    pub timeout: Option<Duration>,
    pub dry_run: bool,
    pub retry: RetrySettings,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from(&ReconcilerConfig::default())
    }
}

impl From<&ReconcilerConfig> for ReconcilerSettings {
    fn from(cfg: &ReconcilerConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency,
            network_batch_size: cfg.network_batch_size,
            network_concurrency: cfg.network_concurrency,
            timeout: cfg.timeout_secs.map(Duration::from_secs),
            dry_run: cfg.dry_run,
            retry: RetrySettings::from(&cfg.retry),
        }
    }
}

/// Desired state for a whole run.
#[derive(Debug, Clone)]
pub struct Policy {
    hubs: BTreeMap<String, Hub>,
    scopes: Vec<Scope>,
    pub features: FeaturesConfig,
    pub reconciler: ReconcilerSettings,
    pub logging: LoggingConfig,
}

impl Policy {
    /// Validate a raw configuration document into a policy.
    ///
    /// Every rule is checked before anything is returned; an unresolvable
    /// hub reference is a configuration error, never a per-scope failure.
    pub fn from_config(config: PolicyConfig) -> Result<Self> {
        let PolicyConfig {
            hubs,
            subscriptions,
            features,
            reconciler,
            logging,
        } = config;

        let mut scopes = Vec::with_capacity(subscriptions.len());
        for (id, scope) in subscriptions {
            if id.trim().is_empty() {
                return Err(ConfigError::validation("scope id must not be empty"));
            }
            let allowed_ranges = scope
                .allowed_cidrs
                .iter()
                .map(|cidr| {
                    cidr.trim().parse::<IpNetwork>().map_err(|_| {
                        ConfigError::validation(format!(
                            "invalid CIDR in allowed ranges of scope {id}: {cidr}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            scopes.push(Scope {
                id,
                hub_name: scope.hub_name,
                allowed_ranges,
                require_hub_peering: scope.require_hub_peering,
                require_nva_routing: scope.require_nva_routing,
                subnet_to_subnet_deny: scope.subnet_to_subnet_deny,
            });
        }

        if hubs.is_empty() {
            return Err(ConfigError::validation(
                "at least one hub configuration is required",
            ));
        }

        let mut by_name = BTreeMap::new();
        for hub in hubs {
            let nva_next_hop = match hub.nva_next_hop.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(raw.parse::<IpAddr>().map_err(|_| {
                    ConfigError::validation(format!("invalid NVA IP for hub {}: {raw}", hub.name))
                })?),
            };
            let name = hub.name.clone();
            let previous = by_name.insert(
                name.clone(),
                Hub {
                    name: hub.name,
                    vnet_id: hub.vnet_id,
                    resource_group: hub.resource_group,
                    nva_next_hop,
                },
            );
            if previous.is_some() {
                return Err(ConfigError::validation(format!(
                    "duplicate hub name: {name}"
                )));
            }
        }

        for scope in &scopes {
            if !by_name.contains_key(&scope.hub_name) {
                return Err(ConfigError::validation(format!(
                    "hub {} not found for scope {}",
                    scope.hub_name, scope.id
                )));
            }
        }

        validate_reconciler(&reconciler)?;
        validate_logging(&logging)?;

        Ok(Self {
            hubs: by_name,
            scopes,
            features,
            reconciler: ReconcilerSettings::from(&reconciler),
            logging,
        })
    }

    /// Look up a hub by name
    pub fn hub(&self, name: &str) -> Option<&Hub> {
        self.hubs.get(name)
    }

    /// The hub assigned to a scope
    pub fn hub_for(&self, scope: &Scope) -> Option<&Hub> {
        self.hub(&scope.hub_name)
    }

    pub fn hubs(&self) -> impl Iterator<Item = &Hub> {
        self.hubs.values()
    }

    /// Scopes in deterministic (id) order
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope(&self, id: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.id == id)
    }

    /// Resolve how a concern is handled for one scope.
    pub fn mode(&self, scope: &Scope, concern: Concern) -> EnforcementMode {
        if !scope.opts_into(concern) {
            return EnforcementMode::Disabled;
        }
        self.features.mode(concern)
    }

    /// Restrict the policy to the given scope ids, preserving order.
    pub fn retain_scopes(&mut self, ids: &[String]) -> Result<()> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for id in &wanted {
            if self.scope(id).is_none() {
                return Err(ConfigError::validation(format!("unknown scope: {id}")));
            }
        }
        self.scopes.retain(|s| wanted.contains(s.id.as_str()));
        Ok(())
    }
}

fn validate_reconciler(cfg: &ReconcilerConfig) -> Result<()> {
    if cfg.max_concurrency == 0 {
        return Err(ConfigError::validation(
            "reconciler.max_concurrency must be > 0",
        ));
    }
    if cfg.network_batch_size == 0 {
        return Err(ConfigError::validation(
            "reconciler.network_batch_size must be > 0",
        ));
    }
    if cfg.network_concurrency == 0 {
        return Err(ConfigError::validation(
            "reconciler.network_concurrency must be > 0",
        ));
    }
    if cfg.retry.max_attempts == 0 {
        return Err(ConfigError::validation(
            "reconciler.retry.max_attempts must be > 0",
        ));
    }
    if cfg.retry.initial_backoff_ms > cfg.retry.max_backoff_ms {
        return Err(ConfigError::validation(
            "reconciler.retry.initial_backoff_ms must be <= reconciler.retry.max_backoff_ms",
        ));
    }
    if !(0.0..=1.0).contains(&cfg.retry.jitter) {
        return Err(ConfigError::validation(
            "reconciler.retry.jitter must be within 0.0..=1.0",
        ));
    }
    Ok(())
}

fn validate_logging(cfg: &LoggingConfig) -> Result<()> {
    let lvl = cfg.level.to_ascii_lowercase();
    if !VALID_LOG_LEVELS.contains(&lvl.as_str()) {
        return Err(ConfigError::validation(format!(
            "logging.level must be one of {VALID_LOG_LEVELS:?}"
        )));
    }
    Ok(())
}
