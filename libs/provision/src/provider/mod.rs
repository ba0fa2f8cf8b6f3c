//! Capability-typed interface over the cloud compute API.
//!
//! The core talks to the provider exclusively through [`ProviderGateway`]:
//! one create call, one describe call. The real adapter lives in
//! [`ecs`]; tests substitute in-memory fakes.

pub mod ecs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::ProvisionError;
use crate::topology::EcsProfile;

/// Errors from the provider API boundary.
///
/// Provider-side rejections, transport failures, and malformed responses
/// are kept distinct from each other and from local validation errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider processed the request and rejected it.
    #[error("provider rejected the request ({code}): {message}")]
    Api {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The request never produced a provider-side answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something this tool cannot decode.
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Instance login method resolved from the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginMethod {
    /// SSH key pair registered with the provider.
    KeyPair(String),
    /// Plain password baked into the instances.
    Password(String),
}

/// One instance-create request, derived from a profile and never persisted.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub template_id: String,
    pub count: usize,
    pub period: Option<i32>,
    pub period_unit: Option<crate::topology::PeriodUnit>,
    pub login: LoginMethod,

    /// Name pattern asking the provider for `count` sequentially suffixed
    /// instance names in one call.
    pub instance_name: String,

    /// Host name pattern, same placeholder scheme as `instance_name`.
    pub host_name: String,

    /// Client token presented to the provider; derived from the wall clock
    /// truncated to the minute, so repeated runs within one minute collapse
    /// into a single logical purchase.
    pub client_token: String,

    /// Dry-run flag, set when the profile is in debug mode.
    pub dry_run: bool,
}

impl ProvisionRequest {
    /// Derive a request from a profile.
    ///
    /// Resolves the login method (key pair beats password; neither is a
    /// [`ProvisionError::MissingCredential`]) and stamps the name patterns
    /// and client token from `now`. Fails before any provider call.
    pub fn from_profile(
        profile: &EcsProfile,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, ProvisionError> {
        let login = resolve_login_method(profile)?;

        let token = idempotency_token(now);
        let name = sequential_name_pattern(&profile.host_name_prefix, &token, count);

        Ok(Self {
            template_id: profile.template_id.clone(),
            count,
            period: profile.period,
            period_unit: profile.period_unit,
            login,
            instance_name: name.clone(),
            host_name: name,
            client_token: token,
            dry_run: profile.debug,
        })
    }
}

/// Resolve the instance login method from a profile.
///
/// A configured key pair must come with the private key file the join
/// mechanism needs later; enforcing that here keeps the failure ahead of
/// any provider call.
fn resolve_login_method(profile: &EcsProfile) -> Result<LoginMethod, ProvisionError> {
    if let Some(key_pair) = &profile.key_pair_name {
        if profile.ssh_key_file.is_none() {
            return Err(ProvisionError::MissingCredential(format!(
                "key pair \"{key_pair}\" is configured without its ssh-key-file"
            )));
        }
        return Ok(LoginMethod::KeyPair(key_pair.clone()));
    }
    if let Some(password) = &profile.password {
        return Ok(LoginMethod::Password(password.clone()));
    }
    Err(ProvisionError::MissingCredential(
        "profile sets neither ssh-key-pair-name nor password".to_string(),
    ))
}

/// Client token for one provisioning minute.
///
/// Two calls within the same minute produce identical tokens, which the
/// provider treats as retries of one request. This is a coarse guard
/// against duplicate purchases, not a dedup protocol.
pub fn idempotency_token(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H-%M").to_string()
}

/// Name pattern requesting `count` auto-suffixed names from the provider.
///
/// The `[N,3]` placeholder is the provider's sequential-suffix syntax:
/// three-digit suffixes starting at N.
pub fn sequential_name_pattern(prefix: &str, token: &str, count: usize) -> String {
    format!("{prefix}-{token}-[{count},3]")
}

/// One instance as reported by the provider's describe call.
#[derive(Debug, Clone)]
pub struct InstanceDescription {
    pub instance_id: String,

    /// Private addresses in provider order; the first one becomes the
    /// node's inner IP.
    pub private_ips: Vec<String>,

    pub host_name: String,

    pub created_at: Option<DateTime<Utc>>,
}

/// Capability interface over the cloud compute API.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Purchase instances. Returns the opaque instance identifiers.
    async fn create_instances(
        &self,
        request: &ProvisionRequest,
    ) -> Result<Vec<String>, ProviderError>;

    /// Resolve instance identifiers to addressable descriptions.
    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceDescription>, ProviderError>;
}

/// Opens a gateway for a validated profile.
///
/// The real factory builds an authenticated client from the profile's
/// region and access keys; tests hand out fakes.
pub trait ProviderFactory: Send + Sync {
    fn open(&self, profile: &EcsProfile) -> Result<Box<dyn ProviderGateway>, ProvisionError>;
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;

    use super::*;
    use crate::topology::PeriodUnit;

    fn profile() -> EcsProfile {
        EcsProfile {
            region_id: "cn-shenzhen".to_string(),
            access_key_id: "ak".to_string(),
            access_key_secret: "secret".to_string(),
            template_id: "lt-test".to_string(),
            period: None,
            period_unit: None,
            host_name_prefix: "worker".to_string(),
            ssh_port: 22,
            key_pair_name: None,
            ssh_key_file: None,
            password: None,
            debug: false,
        }
    }

    #[test]
    fn token_is_stable_within_a_minute() {
        let a = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 59).unwrap();

        assert_eq!(idempotency_token(a), idempotency_token(b));
        assert_eq!(idempotency_token(a), "2019-11-06-15-04");
    }

    #[test]
    fn token_changes_across_a_minute_boundary() {
        let a = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2019, 11, 6, 15, 5, 0).unwrap();

        assert_ne!(idempotency_token(a), idempotency_token(b));
    }

    #[test]
    fn name_pattern_embeds_prefix_token_and_count() {
        let pattern = sequential_name_pattern("worker", "2019-11-06-15-04", 4);
        assert_eq!(pattern, "worker-2019-11-06-15-04-[4,3]");
    }

    #[test]
    fn key_pair_beats_password() {
        let mut p = profile();
        p.key_pair_name = Some("k1".to_string());
        p.ssh_key_file = Some(PathBuf::from("/root/key"));
        p.password = Some("hunter2".to_string());

        let now = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 0).unwrap();
        let request = ProvisionRequest::from_profile(&p, 2, now).unwrap();
        assert_eq!(request.login, LoginMethod::KeyPair("k1".to_string()));
    }

    #[test]
    fn key_pair_without_key_file_is_missing_credential() {
        let mut p = profile();
        p.key_pair_name = Some("k1".to_string());
        p.password = Some("hunter2".to_string());

        let now = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 0).unwrap();
        let err = ProvisionRequest::from_profile(&p, 2, now).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingCredential(_)));
    }

    #[test]
    fn no_login_method_is_missing_credential() {
        let now = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 0).unwrap();
        let err = ProvisionRequest::from_profile(&profile(), 1, now).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingCredential(_)));
    }

    #[test]
    fn request_carries_profile_fields() {
        let mut p = profile();
        p.password = Some("hunter2".to_string());
        p.period = Some(1);
        p.period_unit = Some(PeriodUnit::Week);
        p.debug = true;

        let now = Utc.with_ymd_and_hms(2019, 11, 6, 15, 4, 0).unwrap();
        let request = ProvisionRequest::from_profile(&p, 3, now).unwrap();

        assert_eq!(request.template_id, "lt-test");
        assert_eq!(request.count, 3);
        assert_eq!(request.period, Some(1));
        assert_eq!(request.period_unit, Some(PeriodUnit::Week));
        assert_eq!(request.instance_name, "worker-2019-11-06-15-04-[3,3]");
        assert_eq!(request.host_name, request.instance_name);
        assert_eq!(request.client_token, "2019-11-06-15-04");
        assert!(request.dry_run);
    }
}
