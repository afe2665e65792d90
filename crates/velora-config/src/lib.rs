//! Policy model and configuration management for Velora.
//!
//! This crate turns a raw configuration document into a validated,
//! immutable [`Policy`]:
//! - Hubs with their NVA default-route next hop
//! - Per-scope (subscription) enforcement toggles and allowed address space
//! - Global feature flags deciding which concerns are enforced or only scanned
//! - Reconciler tuning (concurrency, batching, retry, run deadline)
//!
//! # Loading
//!
//! ```text
//!   explicit path ─┐
//!   VELORA_CONFIG ─┼─▶ File source ─┐
//!   ./velora.json ─┘                ├─▶ PolicyConfig ─▶ Policy::from_config ─▶ Policy
//!          VELORA__* environment ───┘
//! ```
//!
//! Validation happens once, before any reconciliation starts. A policy that
//! fails validation never reaches the engine.

pub mod feature_flags;
pub mod loader;
pub mod model;
pub mod policy;

pub use feature_flags::{Concern, EnforcementMode};
pub use loader::{CONFIG_ENV_VAR, ENV_PREFIX, load_config, load_policy};
pub use model::{
    FeaturesConfig, HubConfig, LogFormat, LoggingConfig, PolicyConfig, ReconcilerConfig,
    RetryConfig, ScopeConfig,
};
pub use policy::{Hub, Policy, ReconcilerSettings, RetrySettings, Scope};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns `true` if the document was readable but semantically invalid.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
