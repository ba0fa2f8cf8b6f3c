//! Error taxonomy for a provisioning run.
//!
//! Every stage fails fast: errors propagate upward unchanged, there is no
//! retry or rollback anywhere in the core. A failed describe call after a
//! successful create still surfaces as an error — the purchased instances
//! are left for the operator to reconcile.

use thiserror::Error;

use crate::provider::ProviderError;

/// Errors produced by a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Bad desired count or malformed topology.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The topology names a cloud provider this tool does not implement.
    #[error("cloud provider \"{0}\" is not supported")]
    UnsupportedProvider(String),

    /// Neither a key pair nor a password could be resolved.
    #[error("no usable credential: {0}")]
    MissingCredential(String),

    /// Querying the live cluster for current worker nodes failed.
    #[error("cluster membership query failed: {0}")]
    MembershipQueryFailed(String),

    /// The provider rejected or failed the instance-create call.
    #[error("instance creation failed")]
    ProvisioningFailed(#[source] ProviderError),

    /// The provider rejected or failed the instance-describe call.
    ///
    /// Instances created in the same run may now exist without having been
    /// joined; the tool does not track or clean them up.
    #[error("instance lookup failed")]
    DescribeFailed(#[source] ProviderError),

    /// Empty node set handed to the joiner.
    #[error("invalid join request: {0}")]
    InvalidJoinRequest(String),

    /// The external join mechanism returned a failure.
    #[error("cluster join failed: {0}")]
    JoinFailed(String),
}
