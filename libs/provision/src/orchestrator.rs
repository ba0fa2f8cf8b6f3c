//! Top-level run sequencing.
//!
//! One run is a straight pipeline: resolve the target node set (fixed
//! selection or dynamic provisioning), then hand it to the joiner. No
//! retries at this level; failures in any stage propagate immediately and
//! terminate the run. Partial provisioning is not rolled back.

use std::path::PathBuf;

use tracing::info;

use crate::error::ProvisionError;
use crate::join::{ClusterJoiner, JoinExecutor};
use crate::provider::ProviderFactory;
use crate::provision::DynamicProvisioner;
use crate::select::{select_candidates, MembershipQuery};
use crate::topology::{
    ClusterTopology, DynamicTopology, FixedPool, NodeFact, DYNAMIC_NODE_USER, SUPPORTED_PROVIDER,
};

/// Sequences one provisioning run over injected collaborators.
pub struct Orchestrator<'a> {
    membership: &'a dyn MembershipQuery,
    providers: &'a dyn ProviderFactory,
    executor: &'a dyn JoinExecutor,
    working_directory: PathBuf,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        membership: &'a dyn MembershipQuery,
        providers: &'a dyn ProviderFactory,
        executor: &'a dyn JoinExecutor,
        working_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            membership,
            providers,
            executor,
            working_directory: working_directory.into(),
        }
    }

    /// Run selection/provisioning and join for `desired_count` nodes.
    pub async fn run(
        &self,
        topology: &ClusterTopology,
        desired_count: usize,
    ) -> Result<(), ProvisionError> {
        if desired_count < 1 {
            return Err(ProvisionError::InvalidInput(format!(
                "desired node count must be at least 1, got {desired_count}"
            )));
        }

        match topology {
            ClusterTopology::Fixed(pool) => self.run_fixed(pool, desired_count).await,
            ClusterTopology::Dynamic(topology) => self.run_dynamic(topology, desired_count).await,
        }
    }

    async fn run_fixed(
        &self,
        pool: &FixedPool,
        desired_count: usize,
    ) -> Result<(), ProvisionError> {
        let members = self.membership.worker_host_names().await?;
        let targets = select_candidates(&pool.candidates, desired_count, &members);

        info!(
            candidates = pool.candidates.len(),
            members = members.len(),
            selected = targets.len(),
            "selected fixed-pool nodes"
        );

        self.join(&targets, pool.ssh_port, &pool.user, &pool.credential)
            .await
    }

    async fn run_dynamic(
        &self,
        topology: &DynamicTopology,
        desired_count: usize,
    ) -> Result<(), ProvisionError> {
        if topology.provider != SUPPORTED_PROVIDER {
            return Err(ProvisionError::UnsupportedProvider(
                topology.provider.clone(),
            ));
        }
        let profile = topology.profile.as_ref().ok_or_else(|| {
            ProvisionError::InvalidInput(format!(
                "dynamic topology names \"{SUPPORTED_PROVIDER}\" but carries no profile for it"
            ))
        })?;

        // Resolve the join credential before buying anything: a profile
        // that could purchase but never join must fail without side
        // effects.
        let credential = profile.join_credential()?;

        let gateway = self.providers.open(profile)?;
        let provisioner = DynamicProvisioner::new(gateway.as_ref());
        let nodes = provisioner.provision(profile, desired_count).await?;

        self.join(&nodes, profile.ssh_port, DYNAMIC_NODE_USER, &credential)
            .await
    }

    async fn join(
        &self,
        nodes: &[NodeFact],
        ssh_port: u16,
        user: &str,
        credential: &crate::topology::Credential,
    ) -> Result<(), ProvisionError> {
        let joiner = ClusterJoiner::new(self.executor);
        joiner
            .join(nodes, ssh_port, user, credential, &self.working_directory)
            .await
    }
}
