//! Node-set reconciliation and provisioning core.
//!
//! Given a desired node count and a cluster topology descriptor, one run
//! resolves the nodes that should be targeted — either by selecting from a
//! fixed pool of existing machines or by purchasing instances from the
//! cloud provider — and hands the resolved, addressable node set to the
//! external join mechanism exactly once.
//!
//! # Invariants
//!
//! - Node order is preserved from configuration/provider through selection
//!   to the join lists.
//! - Every stage fails fast; no retries, no rollback of partial
//!   provisioning.
//! - Create requests within one wall-clock minute share a client token, so
//!   the provider collapses them into one purchase.
//!
//! External boundaries (cluster membership, provider API, join script) sit
//! behind capability traits with subprocess/HTTP adapters; tests inject
//! in-memory fakes.

pub mod error;
pub mod join;
pub mod orchestrator;
pub mod provider;
pub mod provision;
pub mod select;
pub mod topology;

pub use error::ProvisionError;
pub use join::{ClusterJoiner, JoinExecutor, JoinRequest, ScriptJoinExecutor};
pub use orchestrator::Orchestrator;
pub use provider::{ProviderError, ProviderFactory, ProviderGateway};
pub use provision::DynamicProvisioner;
pub use select::{KubectlMembership, MembershipQuery};
pub use topology::{
    ClusterTopology, Credential, DynamicTopology, EcsProfile, FixedPool, NodeFact, PeriodUnit,
};
