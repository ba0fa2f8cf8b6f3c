//! Aliyun ECS OpenAPI adapter.
//!
//! Implements [`ProviderGateway`] over the ECS RPC API (`RunInstances`,
//! `DescribeInstances`) with ACS3-HMAC-SHA256 request signing. Requests are
//! GET with all parameters in the query string and an empty payload.
//!
//! Reference: https://api.aliyun.com/document/Ecs/2014-05-26/RunInstances

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{InstanceDescription, LoginMethod, ProviderError, ProviderFactory, ProviderGateway};
use crate::error::ProvisionError;
use crate::topology::EcsProfile;

/// ECS API version.
const API_VERSION: &str = "2014-05-26";

/// Signature scheme identifier.
const SIGNATURE_SCHEME: &str = "ACS3-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Signed HTTP client for one ECS region.
pub struct EcsClient {
    http: reqwest::Client,
    endpoint: String,
    region_id: String,
    access_key_id: String,
    access_key_secret: String,
}

impl EcsClient {
    /// Client for the region's public endpoint.
    pub fn new(
        region_id: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let region_id = region_id.into();
        let endpoint = format!("https://ecs.{region_id}.aliyuncs.com");
        Self::with_endpoint(endpoint, region_id, access_key_id, access_key_secret)
    }

    /// Client against an explicit endpoint. Used by tests to point at a
    /// stub server.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        region_id: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            region_id: region_id.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        })
    }

    /// Issue one signed RPC call and decode the response body.
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: BTreeMap<String, String>,
    ) -> Result<T, ProviderError> {
        let query = canonical_query(&params);
        let url = format!("{}/?{}", self.endpoint, query);

        let host = reqwest::Url::parse(&url)
            .ok()
            .and_then(|u| {
                u.host_str().map(|h| match u.port() {
                    Some(p) => format!("{h}:{p}"),
                    None => h.to_string(),
                })
            })
            .ok_or_else(|| ProviderError::Transport(format!("invalid endpoint: {}", self.endpoint)))?;

        let payload_hash = hex::encode(Sha256::digest(b""));
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        // Canonical headers, sorted by lowercase name.
        let mut headers = BTreeMap::new();
        headers.insert("host", host.clone());
        headers.insert("x-acs-action", action.to_string());
        headers.insert("x-acs-content-sha256", payload_hash.clone());
        headers.insert("x-acs-date", date.clone());
        headers.insert("x-acs-signature-nonce", nonce.clone());
        headers.insert("x-acs-version", API_VERSION.to_string());

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();
        let signed_headers = headers
            .keys()
            .copied()
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request =
            format!("GET\n/\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}");
        let string_to_sign = format!(
            "{SIGNATURE_SCHEME}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let mut mac = HmacSha256::new_from_slice(self.access_key_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(string_to_sign.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let authorization = format!(
            "{SIGNATURE_SCHEME} Credential={},SignedHeaders={signed_headers},Signature={signature}",
            self.access_key_id
        );

        debug!(action, region = %self.region_id, "ECS API request");

        let response = self
            .http
            .get(&url)
            .header("x-acs-action", action)
            .header("x-acs-version", API_VERSION)
            .header("x-acs-date", &date)
            .header("x-acs-signature-nonce", &nonce)
            .header("x-acs-content-sha256", &payload_hash)
            .header("Authorization", &authorization)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(decode_api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProviderGateway for EcsClient {
    async fn create_instances(
        &self,
        request: &super::ProvisionRequest,
    ) -> Result<Vec<String>, ProviderError> {
        let mut params = BTreeMap::new();
        params.insert("RegionId".to_string(), self.region_id.clone());
        params.insert("LaunchTemplateId".to_string(), request.template_id.clone());
        params.insert("Amount".to_string(), request.count.to_string());
        if let Some(period) = request.period {
            params.insert("Period".to_string(), period.to_string());
        }
        if let Some(unit) = request.period_unit {
            params.insert("PeriodUnit".to_string(), unit.as_str().to_string());
        }
        match &request.login {
            LoginMethod::KeyPair(name) => {
                params.insert("KeyPairName".to_string(), name.clone());
            }
            LoginMethod::Password(password) => {
                params.insert("Password".to_string(), password.clone());
            }
        }
        params.insert("InstanceName".to_string(), request.instance_name.clone());
        params.insert("HostName".to_string(), request.host_name.clone());
        params.insert("ClientToken".to_string(), request.client_token.clone());
        if request.dry_run {
            params.insert("DryRun".to_string(), "true".to_string());
        }

        let response: RunInstancesResponse = self.call("RunInstances", params).await?;
        Ok(response.instance_id_sets.instance_id_set)
    }

    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<InstanceDescription>, ProviderError> {
        let ids = serde_json::to_string(instance_ids)
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let mut params = BTreeMap::new();
        params.insert("RegionId".to_string(), self.region_id.clone());
        params.insert("InstanceIds".to_string(), ids);

        let response: DescribeInstancesResponse = self.call("DescribeInstances", params).await?;

        Ok(response
            .instances
            .instance
            .into_iter()
            .map(|body| {
                // Classic-network inner addresses first, then VPC private
                // addresses.
                let mut private_ips = body.inner_ip_address.ip_address;
                if let Some(vpc) = body.vpc_attributes {
                    private_ips.extend(vpc.private_ip_address.ip_address);
                }
                InstanceDescription {
                    instance_id: body.instance_id,
                    private_ips,
                    host_name: body.host_name,
                    created_at: body.creation_time.as_deref().and_then(parse_creation_time),
                }
            })
            .collect())
    }
}

/// Builds real [`EcsClient`] gateways from profiles.
pub struct EcsFactory;

impl ProviderFactory for EcsFactory {
    fn open(&self, profile: &EcsProfile) -> Result<Box<dyn ProviderGateway>, ProvisionError> {
        let client = EcsClient::new(
            profile.region_id.clone(),
            profile.access_key_id.clone(),
            profile.access_key_secret.clone(),
        )
        .map_err(ProvisionError::ProvisioningFailed)?;
        Ok(Box::new(client))
    }
}

/// Map a non-success response body to an API error.
fn decode_api_error(status: u16, body: &str) -> ProviderError {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ErrorBody {
        code: String,
        message: String,
        request_id: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => ProviderError::Api {
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        },
        Err(_) => ProviderError::Api {
            code: format!("HTTP {status}"),
            message: body.trim().to_string(),
            request_id: None,
        },
    }
}

/// ECS timestamps come at minute precision ("2019-11-06T09:22Z"); newer
/// APIs use full RFC 3339.
fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// RFC 3986 percent-encoded, `&`-joined, key-sorted query string. The same
/// string is signed and sent, so signature and wire form cannot drift.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

// Wire types.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesResponse {
    instance_id_sets: InstanceIdSets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceIdSets {
    instance_id_set: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    instances: Instances,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Instances {
    #[serde(default)]
    instance: Vec<InstanceBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceBody {
    instance_id: String,
    host_name: String,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    inner_ip_address: IpAddressList,
    #[serde(default)]
    vpc_attributes: Option<VpcAttributes>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IpAddressList {
    #[serde(default)]
    ip_address: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VpcAttributes {
    #[serde(default)]
    private_ip_address: IpAddressList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_query_sorts_and_encodes() {
        let mut params = BTreeMap::new();
        params.insert("RegionId".to_string(), "cn-shenzhen".to_string());
        params.insert("InstanceName".to_string(), "worker-[2,3]".to_string());
        params.insert("Amount".to_string(), "2".to_string());

        assert_eq!(
            canonical_query(&params),
            "Amount=2&InstanceName=worker-%5B2%2C3%5D&RegionId=cn-shenzhen"
        );
    }

    #[test]
    fn percent_encode_keeps_unreserved() {
        assert_eq!(percent_encode("worker-01_a.b~c"), "worker-01_a.b~c");
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("[\"i-1\"]"), "%5B%22i-1%22%5D");
    }

    #[test]
    fn creation_time_minute_precision() {
        let ts = parse_creation_time("2019-11-06T09:22Z").unwrap();
        assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2019-11-06 09:22:00");
    }

    #[test]
    fn creation_time_rfc3339() {
        assert!(parse_creation_time("2019-11-06T09:22:15Z").is_some());
        assert!(parse_creation_time("not-a-time").is_none());
    }

    #[test]
    fn api_error_body_decodes() {
        let body = r#"{"Code":"InvalidTemplate.NotFound","Message":"template missing","RequestId":"ABC-123"}"#;
        let err = decode_api_error(404, body);
        match err {
            ProviderError::Api { code, message, request_id } => {
                assert_eq!(code, "InvalidTemplate.NotFound");
                assert_eq!(message, "template missing");
                assert_eq!(request_id.as_deref(), Some("ABC-123"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = decode_api_error(502, "bad gateway");
        match err {
            ProviderError::Api { code, message, .. } => {
                assert_eq!(code, "HTTP 502");
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
