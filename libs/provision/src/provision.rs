//! Dynamic provisioning against the provider gateway.
//!
//! Two-phase protocol: create instances from the launch template, then
//! resolve the returned identifiers to addressable node facts with a
//! single describe call. There is no readiness polling — instances may
//! not be SSH-reachable yet when this returns, and tolerating that is the
//! join mechanism's concern.

use chrono::Utc;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::provider::{InstanceDescription, ProviderError, ProviderGateway, ProvisionRequest};
use crate::topology::{EcsProfile, NodeFact};

/// Drives instance purchases for one run.
pub struct DynamicProvisioner<'a> {
    gateway: &'a dyn ProviderGateway,
}

impl<'a> DynamicProvisioner<'a> {
    pub fn new(gateway: &'a dyn ProviderGateway) -> Self {
        Self { gateway }
    }

    /// Purchase `desired_count` instances and resolve them to node facts.
    ///
    /// Create-phase rejections surface as
    /// [`ProvisionError::ProvisioningFailed`]; describe-phase failures as
    /// [`ProvisionError::DescribeFailed`] even though instances now exist.
    pub async fn provision(
        &self,
        profile: &EcsProfile,
        desired_count: usize,
    ) -> Result<Vec<NodeFact>, ProvisionError> {
        let request = ProvisionRequest::from_profile(profile, desired_count, Utc::now())?;

        info!(
            template = %request.template_id,
            count = request.count,
            client_token = %request.client_token,
            dry_run = request.dry_run,
            "creating instances"
        );

        let instance_ids = self
            .gateway
            .create_instances(&request)
            .await
            .map_err(ProvisionError::ProvisioningFailed)?;

        if instance_ids.len() != desired_count {
            // The provider owns the count; log the mismatch and continue
            // with what it reported.
            warn!(
                requested = desired_count,
                created = instance_ids.len(),
                "provider returned a different instance count"
            );
        }

        let described = self
            .gateway
            .describe_instances(&instance_ids)
            .await
            .map_err(ProvisionError::DescribeFailed)?;

        let nodes = described
            .into_iter()
            .map(node_fact_from_description)
            .collect::<Result<Vec<_>, _>>()?;

        info!(nodes = nodes.len(), "resolved node facts");
        Ok(nodes)
    }
}

/// Convert one describe result into a node fact.
///
/// The inner IP is the first private address; an instance reporting no
/// address yet cannot be joined and fails the run.
fn node_fact_from_description(
    description: InstanceDescription,
) -> Result<NodeFact, ProvisionError> {
    let inner_ip = description
        .private_ips
        .first()
        .cloned()
        .ok_or_else(|| {
            ProvisionError::DescribeFailed(ProviderError::Decode(format!(
                "instance {} reported no private address",
                description.instance_id
            )))
        })?;

    Ok(NodeFact {
        instance_id: Some(description.instance_id),
        inner_ip,
        host_name: description.host_name,
        created_at: description.created_at,
    })
}
