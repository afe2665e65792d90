//! Per-route-table mutual exclusion.
//!
//! At most one mutation sequence touches a given route table at a time,
//! across every scope worker of a run.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use velora_topology::ResourceId;

#[derive(Debug, Clone, Default)]
pub struct RouteTableLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl RouteTableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a route table.
    pub async fn lock(&self, route_table: &ResourceId) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(route_table.key())
            .or_default()
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Number of route tables seen so far
    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}
