//! Fixed-pool candidate selection.
//!
//! Selection is the complement between the configured candidate pool and
//! the nodes already in the cluster, computed as a pure function over a
//! membership snapshot. The snapshot comes from a [`MembershipQuery`]
//! capability so the subprocess boundary stays out of the logic.
//!
//! The snapshot is not revalidated before the join — membership changing
//! in between is an accepted race for this single-operator tool.

use std::collections::HashSet;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ProvisionError;
use crate::topology::NodeFact;

/// Select up to `desired_count` candidates that are not yet cluster members.
///
/// Iterates the pool in configured order and emits candidates whose host
/// name is absent from `current_members`, stopping once `desired_count`
/// are emitted or the pool is exhausted. Returns a partial set when the
/// pool runs dry; never pads, never errors.
pub fn select_candidates(
    pool: &[NodeFact],
    desired_count: usize,
    current_members: &HashSet<String>,
) -> Vec<NodeFact> {
    pool.iter()
        .filter(|node| !current_members.contains(&node.host_name))
        .take(desired_count)
        .cloned()
        .collect()
}

/// Capability interface over the live cluster's membership state.
#[async_trait]
pub trait MembershipQuery: Send + Sync {
    /// Host names currently labeled as worker nodes.
    async fn worker_host_names(&self) -> Result<HashSet<String>, ProvisionError>;
}

/// Default node label selecting worker (invoker) nodes.
pub const DEFAULT_WORKER_SELECTOR: &str = "openwhisk-role=invoker";

/// Membership snapshot via `kubectl get nodes`.
pub struct KubectlMembership {
    selector: String,
}

impl KubectlMembership {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl Default for KubectlMembership {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_SELECTOR)
    }
}

#[async_trait]
impl MembershipQuery for KubectlMembership {
    async fn worker_host_names(&self) -> Result<HashSet<String>, ProvisionError> {
        let output = tokio::process::Command::new("kubectl")
            .args(["get", "nodes", "-l", &self.selector, "-o", "name"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProvisionError::MembershipQueryFailed(format!("kubectl: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::MembershipQueryFailed(format!(
                "kubectl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let names = parse_node_names(&String::from_utf8_lossy(&output.stdout));
        debug!(members = names.len(), selector = %self.selector, "membership snapshot");
        Ok(names)
    }
}

/// Parse `kubectl get nodes -o name` output ("node/<name>" per line).
fn parse_node_names(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.strip_prefix("node/").unwrap_or(line).to_string())
        .collect()
}
