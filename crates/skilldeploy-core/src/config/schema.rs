//! Configuration schema for skilldeploy.toml

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::import::ImportPolicies;
use crate::poll::RetryPolicy;
use crate::types::PackageType;

/// Root configuration structure for skilldeploy.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectConfig {
    /// API endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,

    /// Polling cadence overrides
    #[serde(default)]
    pub polling: PollingConfig,

    /// Deploy profiles by name
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl ProjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile(&self, name: &str) -> anyhow::Result<&ProfileConfig> {
        self.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            anyhow::anyhow!(
                "Profile '{}' not found in skilldeploy.toml (known profiles: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.polling.validate()?;
        for (name, profile) in &self.profiles {
            profile
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid profile '{}': {}", name, e))?;
        }
        Ok(())
    }
}

/// `[polling]` table
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PollingConfig {
    /// Overall deadline for a deploy, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import: Option<PolicyOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<PolicyOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<PolicyOverride>,
}

impl PollingConfig {
    pub fn import_policies(&self) -> ImportPolicies {
        ImportPolicies {
            import: PolicyOverride::apply(self.import.as_ref(), RetryPolicy::import_status()),
            build: PolicyOverride::apply(self.build.as_ref(), RetryPolicy::build_status()),
        }
    }

    pub fn export_policy(&self) -> RetryPolicy {
        PolicyOverride::apply(self.export.as_ref(), RetryPolicy::export_status())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let policies = self.import_policies();
        policies
            .import
            .validate()
            .map_err(|e| anyhow::anyhow!("polling.import: {}", e))?;
        policies
            .build
            .validate()
            .map_err(|e| anyhow::anyhow!("polling.build: {}", e))?;
        self.export_policy()
            .validate()
            .map_err(|e| anyhow::anyhow!("polling.export: {}", e))?;
        if self.timeout_secs == Some(0) {
            anyhow::bail!("polling.timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

/// Partial [`RetryPolicy`]; unset keys keep the defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct PolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl PolicyOverride {
    fn apply(over: Option<&Self>, base: RetryPolicy) -> RetryPolicy {
        let Some(over) = over else {
            return base;
        };
        RetryPolicy {
            base_delay_ms: over.base_delay_ms.unwrap_or(base.base_delay_ms),
            backoff_factor: over.backoff_factor.unwrap_or(base.backoff_factor),
            max_attempts: over.max_attempts.unwrap_or(base.max_attempts),
        }
    }
}

/// `[profiles.<name>]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    /// Vendor to create new skills under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,

    /// Skill package directory, relative to the project root
    #[serde(default = "default_skill_package")]
    pub skill_package: PathBuf,

    #[serde(default)]
    pub package_type: PackageType,

    /// Code regions by region name
    #[serde(default)]
    pub code: BTreeMap<String, CodeRegionConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<InfrastructureConfig>,
}

fn default_skill_package() -> PathBuf {
    PathBuf::from("skill-package")
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            vendor_id: None,
            skill_package: default_skill_package(),
            package_type: PackageType::default(),
            code: BTreeMap::new(),
            infrastructure: None,
        }
    }
}

impl ProfileConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.skill_package.as_os_str().is_empty() {
            anyhow::bail!("skill_package must not be empty");
        }
        for (region, code) in &self.code {
            if code.src.as_os_str().is_empty() {
                anyhow::bail!("code.{}.src must not be empty", region);
            }
        }
        if let Some(infra) = &self.infrastructure
            && infra.command.is_empty()
        {
            anyhow::bail!("infrastructure.command must not be empty");
        }
        Ok(())
    }
}

/// `[profiles.<name>.code.<region>]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeRegionConfig {
    /// Source directory, relative to the project root
    pub src: PathBuf,

    /// Build command run inside `src`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build: Vec<String>,
}

/// `[profiles.<name>.infrastructure]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureConfig {
    /// Deployer kind, recorded as the deployment-type marker
    #[serde(rename = "type", default = "default_infrastructure_type")]
    pub kind: String,

    /// Command run from the project root
    pub command: Vec<String>,
}

fn default_infrastructure_type() -> String {
    "command".to_string()
}
