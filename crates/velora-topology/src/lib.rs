//! # velora-topology
//!
//! Topology snapshot provider abstraction for Velora.
//!
//! This crate defines the entity model (networks, subnets, route tables,
//! peerings), the traits a provider backend must implement, and an
//! in-memory backend. The reconciliation engine consumes these traits; it
//! never talks to a cloud SDK directly.
//!
//! ## Overview
//!
//! - [`TopologyProvider`] lists entities one page at a time
//! - [`TopologyMutator`] applies idempotent, full-payload mutations
//! - [`ClientFactory`] builds an immutable [`ScopedClient`] per scope
//! - [`paginate`] turns page calls into lazy, restartable streams
//!
//! ## Example
//!
//! ```ignore
//! use futures_util::TryStreamExt;
//! use velora_topology::{ClientFactory, paginate};
//!
//! let client = factory.client_for("sub-a")?;
//! let provider = client.provider().clone();
//! let networks: Vec<_> = paginate(move |page| {
//!     let provider = provider.clone();
//!     async move { provider.list_networks(page).await }
//! })
//! .try_collect()
//! .await?;
//! ```

mod error;
mod id;
pub mod memory;
mod pager;
mod traits;
mod types;

pub use error::{ErrorCategory, ProviderError};
pub use id::ResourceId;
pub use memory::{
    InMemoryTopology, MutationRecord, NetworkRecord, Operation, RouteTable, ScopeTopology,
    TopologySnapshot,
};
pub use pager::paginate;
pub use traits::{ClientFactory, ScopedClient, TopologyMutator, TopologyProvider};
pub use types::{
    DEFAULT_ROUTE_PREFIX, Network, NextHopType, Page, PageToken, Peering, PeeringState, Route,
    Subnet,
};

/// Type alias for a provider result.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Type alias for a shareable client factory.
pub type DynClientFactory = std::sync::Arc<dyn ClientFactory>;
