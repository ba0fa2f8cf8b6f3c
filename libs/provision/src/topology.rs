//! Topology and node value types.
//!
//! A run operates on exactly one [`ClusterTopology`] variant, constructed
//! once from validated configuration and read-only afterwards. All
//! configured-or-default resolution happens in the configuration layer —
//! the types here carry resolved values only.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// The single cloud provider identifier this tool implements.
pub const SUPPORTED_PROVIDER: &str = "aliyun";

/// Default SSH user for freshly purchased instances.
pub const DYNAMIC_NODE_USER: &str = "root";

/// Resolved, addressable description of one node.
///
/// Produced from static configuration (fixed mode, `instance_id` absent) or
/// from provider query results (dynamic mode, all fields present).
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFact {
    /// Provider instance identifier, when the node was purchased.
    pub instance_id: Option<String>,

    /// Inner (private network) IP address. Never empty.
    pub inner_ip: String,

    /// Host name the node will carry inside the cluster. Never empty.
    pub host_name: String,

    /// Creation time reported by the provider.
    pub created_at: Option<DateTime<Utc>>,
}

impl NodeFact {
    /// A fact for a pre-existing machine from the configured pool.
    pub fn fixed(inner_ip: impl Into<String>, host_name: impl Into<String>) -> Self {
        Self {
            instance_id: None,
            inner_ip: inner_ip.into(),
            host_name: host_name.into(),
            created_at: None,
        }
    }
}

/// Login credential for the join mechanism.
///
/// Exactly one form is present by construction; resolution failure is a
/// configuration error ([`ProvisionError::MissingCredential`]), never a
/// silent default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Path to an SSH private key file.
    KeyFile(PathBuf),
    /// Plain password.
    Password(String),
}

/// Cluster topology descriptor. Exactly one variant is active per run.
#[derive(Debug, Clone)]
pub enum ClusterTopology {
    /// Statically enumerated candidate pool of existing machines.
    Fixed(FixedPool),
    /// Nodes are purchased on demand from a cloud provider.
    Dynamic(DynamicTopology),
}

/// Fixed-mode candidate pool and join parameters.
#[derive(Debug, Clone)]
pub struct FixedPool {
    /// SSH port the candidates listen on.
    pub ssh_port: u16,

    /// SSH user for the join mechanism.
    pub user: String,

    /// Join credential.
    pub credential: Credential,

    /// Candidate nodes in configured order. Order is preserved through
    /// selection and join.
    pub candidates: Vec<NodeFact>,
}

/// Dynamic-mode descriptor.
///
/// The provider identifier stays a plain string so the orchestrator can
/// reject unsupported providers before any network call; the profile is
/// only present when the configuration carried the matching section.
#[derive(Debug, Clone)]
pub struct DynamicTopology {
    /// Configured cloud provider identifier.
    pub provider: String,

    /// Provider profile, present when the configuration has one.
    pub profile: Option<EcsProfile>,
}

/// Purchase period unit for subscription-billed instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodUnit {
    Month,
    Week,
}

impl PeriodUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "Month",
            Self::Week => "Week",
        }
    }
}

/// Aliyun ECS provider profile.
///
/// `host_name_prefix` and `ssh_port` arrive here already resolved to their
/// defaults ("worker", 22); the core never re-defaults them.
#[derive(Debug, Clone)]
pub struct EcsProfile {
    /// Provider region, e.g. "cn-shenzhen".
    pub region_id: String,

    /// Access key ID (may be a RAM user).
    pub access_key_id: String,

    /// Access key secret.
    pub access_key_secret: String,

    /// Launch template the instances are created from.
    pub template_id: String,

    /// Purchase period; unset for post-paid templates.
    pub period: Option<i32>,

    /// Purchase period unit.
    pub period_unit: Option<PeriodUnit>,

    /// Prefix for generated instance and host names.
    pub host_name_prefix: String,

    /// SSH port the created instances listen on.
    pub ssh_port: u16,

    /// SSH key pair registered with the provider. Takes priority over
    /// `password` as the instance login method; requires `ssh_key_file`.
    pub key_pair_name: Option<String>,

    /// Private key file matching `key_pair_name`, used by the join
    /// mechanism.
    pub ssh_key_file: Option<PathBuf>,

    /// Password login, used when no key pair is configured.
    pub password: Option<String>,

    /// Ask the provider to dry-run the create call instead of purchasing.
    pub debug: bool,
}

impl EcsProfile {
    /// Resolve the credential the join mechanism will use for the
    /// purchased nodes. Key file beats password.
    ///
    /// Called before the create phase so a profile that could purchase but
    /// never join fails without buying anything.
    pub fn join_credential(&self) -> Result<Credential, ProvisionError> {
        if let Some(key_file) = &self.ssh_key_file {
            return Ok(Credential::KeyFile(key_file.clone()));
        }
        if let Some(password) = &self.password {
            return Ok(Credential::Password(password.clone()));
        }
        Err(ProvisionError::MissingCredential(
            "profile sets neither ssh-key-file nor password; the joined nodes would be unreachable"
                .to_string(),
        ))
    }
}
