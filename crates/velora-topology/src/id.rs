//! Provider resource identifiers.
//!
//! Ids follow the `/key/value/key/value/...` convention, e.g.
//! `/subscriptions/<s>/resourceGroups/<rg>/providers/Microsoft.Network/virtualNetworks/<name>`.
//! Keys are matched case-insensitively and malformed ids never panic; lookups
//! simply return `None`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value following `key` in the id, e.g. `segment("routeTables")`.
    pub fn segment(&self, key: &str) -> Option<&str> {
        let parts: Vec<&str> = self.0.trim_end_matches('/').split('/').collect();
        let mut i = 1;
        while i + 1 < parts.len() {
            if parts[i].eq_ignore_ascii_case(key) && !parts[i + 1].is_empty() {
                return Some(parts[i + 1]);
            }
            i += 2;
        }
        None
    }

    pub fn subscription(&self) -> Option<&str> {
        self.segment("subscriptions")
    }

    pub fn resource_group(&self) -> Option<&str> {
        self.segment("resourceGroups")
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Id of a child resource, e.g. `vnet.child("subnets", "app")`.
    pub fn child(&self, kind: &str, name: &str) -> Self {
        Self(format!("{}/{kind}/{name}", self.0.trim_end_matches('/')))
    }

    /// Normalized form used for identity comparisons and map keys.
    pub fn key(&self) -> String {
        self.0.trim_end_matches('/').to_ascii_lowercase()
    }

    /// Providers treat ids case-insensitively.
    pub fn same_resource(&self, other: &ResourceId) -> bool {
        self.0
            .trim_end_matches('/')
            .eq_ignore_ascii_case(other.0.trim_end_matches('/'))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
