//! Configuration document loading and resolution.
//!
//! The YAML document is the primary source; CLI flag values fill in what
//! it omits, and built-in defaults fill in the rest (SSH port 22, user
//! "root", node count 1). Resolution happens once, here — the core
//! receives immutable, fully resolved values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nodelift_provision::{
    ClusterTopology, Credential, DynamicTopology, EcsProfile, FixedPool, NodeFact, PeriodUnit,
    ProvisionError,
};
use serde::Deserialize;

/// Default SSH port when neither document nor flags set one.
const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH user for fixed pools.
const DEFAULT_USER: &str = "root";

/// Default prefix for generated host names.
const DEFAULT_HOST_NAME_PREFIX: &str = "worker";

/// CLI flag values used when the document omits a field.
#[derive(Debug, Clone)]
pub struct CliDefaults {
    pub node_count: usize,
    pub working_directory: PathBuf,
}

/// Fully resolved inputs for one run.
#[derive(Debug)]
pub struct RunPlan {
    pub topology: ClusterTopology,
    pub node_count: usize,
    pub working_directory: PathBuf,
}

/// Raw configuration document, as written by the operator.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConfigDocument {
    pub cluster_type: Option<String>,
    pub fixed: Option<FixedSection>,
    pub dynamic: Option<DynamicSection>,
    pub node_count: Option<usize>,
    pub working_directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FixedSection {
    pub ssh_port: Option<u16>,
    pub user_name: Option<String>,
    pub ssh_key_file: Option<PathBuf>,
    pub password: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeEntry {
    pub inner_ip: String,
    pub host_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DynamicSection {
    pub cloud_provider: String,
    pub aliyun: Option<AliyunSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AliyunSection {
    pub region_id: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub template_id: String,
    pub period: Option<i32>,
    pub period_unit: Option<String>,
    pub host_name_prefix: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_key_pair_name: Option<String>,
    pub ssh_key_file: Option<PathBuf>,
    pub password: Option<String>,
    pub debug: Option<bool>,
}

impl ConfigDocument {
    /// Load and parse the document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    }

    /// Resolve the document against CLI defaults into run inputs.
    pub fn resolve(self, defaults: &CliDefaults) -> Result<RunPlan> {
        let node_count = self.node_count.unwrap_or(defaults.node_count);
        let working_directory = self
            .working_directory
            .unwrap_or_else(|| defaults.working_directory.clone());

        let cluster_type = self.cluster_type.as_deref().unwrap_or("fixed");
        let topology = match cluster_type {
            "fixed" => {
                let section = self.fixed.ok_or_else(|| {
                    ProvisionError::InvalidInput(
                        "cluster-type is \"fixed\" but the fixed section is missing".to_string(),
                    )
                })?;
                ClusterTopology::Fixed(resolve_fixed(section)?)
            }
            "dynamic" => {
                let section = self.dynamic.ok_or_else(|| {
                    ProvisionError::InvalidInput(
                        "cluster-type is \"dynamic\" but the dynamic section is missing"
                            .to_string(),
                    )
                })?;
                ClusterTopology::Dynamic(DynamicTopology {
                    provider: section.cloud_provider,
                    profile: section.aliyun.map(resolve_aliyun).transpose()?,
                })
            }
            other => {
                return Err(ProvisionError::InvalidInput(format!(
                    "cluster type \"{other}\" is not supported"
                ))
                .into())
            }
        };

        Ok(RunPlan {
            topology,
            node_count,
            working_directory,
        })
    }
}

fn resolve_fixed(section: FixedSection) -> Result<FixedPool> {
    let credential = match (
        non_empty_path(section.ssh_key_file),
        non_empty(section.password),
    ) {
        // Key file wins when both are configured.
        (Some(key_file), _) => Credential::KeyFile(key_file),
        (None, Some(password)) => Credential::Password(password),
        (None, None) => {
            return Err(ProvisionError::MissingCredential(
                "fixed section sets neither ssh-key-file nor password".to_string(),
            )
            .into())
        }
    };

    let candidates = section
        .nodes
        .into_iter()
        .map(|entry| {
            if entry.inner_ip.is_empty() || entry.host_name.is_empty() {
                return Err(ProvisionError::InvalidInput(
                    "fixed node entries need both inner-ip and host-name".to_string(),
                ));
            }
            Ok(NodeFact::fixed(entry.inner_ip, entry.host_name))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FixedPool {
        ssh_port: section.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
        user: section
            .user_name
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string()),
        credential,
        candidates,
    })
}

fn resolve_aliyun(section: AliyunSection) -> Result<EcsProfile> {
    let period_unit = section
        .period_unit
        .as_deref()
        .map(|raw| match raw {
            "Month" => Ok(PeriodUnit::Month),
            "Week" => Ok(PeriodUnit::Week),
            other => Err(ProvisionError::InvalidInput(format!(
                "period-unit must be \"Month\" or \"Week\", got \"{other}\""
            ))),
        })
        .transpose()?;

    Ok(EcsProfile {
        region_id: section.region_id,
        access_key_id: section.access_key_id,
        access_key_secret: section.access_key_secret,
        template_id: section.template_id,
        period: section.period,
        period_unit,
        host_name_prefix: non_empty(section.host_name_prefix)
            .unwrap_or_else(|| DEFAULT_HOST_NAME_PREFIX.to_string()),
        ssh_port: section.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
        key_pair_name: non_empty(section.ssh_key_pair_name),
        ssh_key_file: non_empty_path(section.ssh_key_file),
        password: non_empty(section.password),
        debug: section.debug.unwrap_or(false),
    })
}

/// Empty strings in the document count as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|v| !v.as_os_str().is_empty())
}
