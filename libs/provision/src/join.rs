//! Handing the resolved node set to the cluster's join mechanism.
//!
//! The join mechanism is an external script with a fixed argument
//! contract: two comma-joined lists (inner IPs, host names) that it
//! correlates positionally, the SSH port, user, exactly one credential
//! flag, and the working directory. Everything up to the executor call is
//! pure computation; the executor invocation is where real infrastructure
//! mutation happens.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::ProvisionError;
use crate::topology::{Credential, NodeFact};

/// Serialize nodes into the two order-matched comma-joined lists.
///
/// Both strings come from the same pass over the same sequence, so length
/// and position always line up.
pub fn serialize_node_lists(nodes: &[NodeFact]) -> (String, String) {
    let ips = nodes
        .iter()
        .map(|n| n.inner_ip.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let names = nodes
        .iter()
        .map(|n| n.host_name.as_str())
        .collect::<Vec<_>>()
        .join(",");
    (ips, names)
}

/// Fully serialized request for one join invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub inner_ips: String,
    pub host_names: String,
    pub ssh_port: u16,
    pub user: String,
    pub credential: Credential,
    pub working_directory: PathBuf,
}

/// Capability interface over the external join mechanism.
#[async_trait]
pub trait JoinExecutor: Send + Sync {
    async fn join(&self, request: &JoinRequest) -> Result<(), ProvisionError>;
}

/// Validates and serializes a node set, then invokes the executor once.
pub struct ClusterJoiner<'a> {
    executor: &'a dyn JoinExecutor,
}

impl<'a> ClusterJoiner<'a> {
    pub fn new(executor: &'a dyn JoinExecutor) -> Self {
        Self { executor }
    }

    /// Join `nodes` into the cluster.
    ///
    /// An empty node set fails with [`ProvisionError::InvalidJoinRequest`]
    /// without invoking the external mechanism.
    pub async fn join(
        &self,
        nodes: &[NodeFact],
        ssh_port: u16,
        user: &str,
        credential: &Credential,
        working_directory: &Path,
    ) -> Result<(), ProvisionError> {
        if nodes.is_empty() {
            return Err(ProvisionError::InvalidJoinRequest(
                "no nodes to join".to_string(),
            ));
        }

        let (inner_ips, host_names) = serialize_node_lists(nodes);
        info!(nodes = nodes.len(), ips = %inner_ips, names = %host_names, "joining nodes");

        let request = JoinRequest {
            inner_ips,
            host_names,
            ssh_port,
            user: user.to_string(),
            credential: credential.clone(),
            working_directory: working_directory.to_path_buf(),
        };

        self.executor.join(&request).await
    }
}

/// Join script file name, looked up in the working directory.
pub const JOIN_SCRIPT: &str = "join-k8s.sh";

/// Runs the join script as a subprocess.
pub struct ScriptJoinExecutor;

impl ScriptJoinExecutor {
    fn command_args(request: &JoinRequest) -> Vec<String> {
        let mut args = vec![
            "-h".to_string(),
            request.inner_ips.clone(),
            "-P".to_string(),
            request.ssh_port.to_string(),
            "-n".to_string(),
            request.host_names.clone(),
            "-u".to_string(),
            request.user.clone(),
        ];
        match &request.credential {
            Credential::KeyFile(path) => {
                args.push("-s".to_string());
                args.push(path.display().to_string());
            }
            Credential::Password(password) => {
                args.push("-p".to_string());
                args.push(password.clone());
            }
        }
        args.push("-d".to_string());
        args.push(request.working_directory.display().to_string());
        args
    }
}

#[async_trait]
impl JoinExecutor for ScriptJoinExecutor {
    async fn join(&self, request: &JoinRequest) -> Result<(), ProvisionError> {
        let script = request.working_directory.join(JOIN_SCRIPT);
        let args = Self::command_args(request);

        let output = tokio::process::Command::new(&script)
            .args(&args)
            .current_dir(&request.working_directory)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProvisionError::JoinFailed(format!("{}: {e}", script.display())))?;

        // The script's output is opaque here; pass it through for the
        // operator.
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            info!(script = %script.display(), "join output:\n{}", stdout.trim());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            error!(script = %script.display(), "join stderr:\n{}", stderr.trim());
        }

        if !output.status.success() {
            return Err(ProvisionError::JoinFailed(format!(
                "{} exited with {}",
                script.display(),
                output.status
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<NodeFact> {
        vec![
            NodeFact::fixed("10.0.0.5", "worker-1"),
            NodeFact::fixed("10.0.0.6", "worker-2"),
            NodeFact::fixed("10.0.0.7", "worker-3"),
        ]
    }

    #[test]
    fn lists_are_order_matched() {
        let (ips, names) = serialize_node_lists(&nodes());
        assert_eq!(ips, "10.0.0.5,10.0.0.6,10.0.0.7");
        assert_eq!(names, "worker-1,worker-2,worker-3");
        assert_eq!(ips.split(',').count(), names.split(',').count());
    }

    #[test]
    fn single_node_has_no_separator() {
        let (ips, names) = serialize_node_lists(&nodes()[..1]);
        assert_eq!(ips, "10.0.0.5");
        assert_eq!(names, "worker-1");
    }

    #[test]
    fn key_file_maps_to_s_flag() {
        let request = JoinRequest {
            inner_ips: "10.0.0.5".to_string(),
            host_names: "worker-1".to_string(),
            ssh_port: 12345,
            user: "root".to_string(),
            credential: Credential::KeyFile(PathBuf::from("/root/key")),
            working_directory: PathBuf::from("/root/node-handler"),
        };

        let args = ScriptJoinExecutor::command_args(&request);
        assert_eq!(
            args,
            [
                "-h",
                "10.0.0.5",
                "-P",
                "12345",
                "-n",
                "worker-1",
                "-u",
                "root",
                "-s",
                "/root/key",
                "-d",
                "/root/node-handler",
            ]
        );
    }

    #[test]
    fn password_maps_to_p_flag() {
        let request = JoinRequest {
            inner_ips: "10.0.0.5".to_string(),
            host_names: "worker-1".to_string(),
            ssh_port: 22,
            user: "ubuntu".to_string(),
            credential: Credential::Password("hunter2".to_string()),
            working_directory: PathBuf::from("/srv"),
        };

        let args = ScriptJoinExecutor::command_args(&request);
        assert!(args.windows(2).any(|w| w == ["-p", "hunter2"]));
        assert!(!args.contains(&"-s".to_string()));
    }
}
