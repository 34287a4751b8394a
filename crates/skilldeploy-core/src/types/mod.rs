//! Shared core types used across configuration, state and deploy layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which deploy stages to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentTarget {
    /// Skill package import only.
    Metadata,
    /// Code build only.
    Code,
    /// Code build followed by infrastructure deploy.
    #[serde(rename = "skill-infrastructure")]
    Infrastructure,
    /// Every stage, including enablement.
    #[default]
    All,
}

impl DeploymentTarget {
    pub fn runs_metadata(self) -> bool {
        matches!(self, DeploymentTarget::Metadata | DeploymentTarget::All)
    }

    pub fn runs_code(self) -> bool {
        matches!(
            self,
            DeploymentTarget::Code | DeploymentTarget::Infrastructure | DeploymentTarget::All
        )
    }

    pub fn runs_infrastructure(self) -> bool {
        matches!(
            self,
            DeploymentTarget::Infrastructure | DeploymentTarget::All
        )
    }

    /// Enablement only follows a full deploy.
    pub fn runs_enablement(self) -> bool {
        self == DeploymentTarget::All
    }
}

impl FromStr for DeploymentTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" | "skill-metadata" => Ok(DeploymentTarget::Metadata),
            "code" | "skill-code" => Ok(DeploymentTarget::Code),
            "skill-infrastructure" | "infrastructure" => Ok(DeploymentTarget::Infrastructure),
            "all" => Ok(DeploymentTarget::All),
            other => anyhow::bail!(
                "Unknown deploy target: {}. Use metadata, code or skill-infrastructure",
                other
            ),
        }
    }
}

/// Package build pipeline flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// A single import-status resource decides completion.
    #[default]
    Standard,
    /// Per-locale builds fan out; the build-status resource must agree.
    Advanced,
}

impl PackageType {
    pub fn is_advanced(self) -> bool {
        self == PackageType::Advanced
    }
}

/// Pipeline stage, used to label outcomes and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployStage {
    Metadata,
    Code,
    Infrastructure,
    Enablement,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployStage::Metadata => "skill metadata",
            DeployStage::Code => "code build",
            DeployStage::Infrastructure => "skill infrastructure",
            DeployStage::Enablement => "skill enablement",
        };
        f.write_str(name)
    }
}

/// Skill stage on the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStage {
    #[default]
    Development,
    Live,
}

impl SkillStage {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillStage::Development => "development",
            SkillStage::Live => "live",
        }
    }
}

impl FromStr for SkillStage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(SkillStage::Development),
            "live" => Ok(SkillStage::Live),
            other => anyhow::bail!("Unknown skill stage: {}. Use development or live", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_stage_selection() {
        let all = DeploymentTarget::default();
        assert!(all.runs_metadata() && all.runs_code() && all.runs_infrastructure());
        assert!(all.runs_enablement());

        let infra: DeploymentTarget = "skill-infrastructure".parse().unwrap();
        assert!(!infra.runs_metadata());
        assert!(infra.runs_code());
        assert!(infra.runs_infrastructure());
        assert!(!infra.runs_enablement());

        let metadata: DeploymentTarget = "metadata".parse().unwrap();
        assert!(metadata.runs_metadata());
        assert!(!metadata.runs_code());
        assert!(!metadata.runs_enablement());
    }

    #[test]
    fn test_unknown_target_rejected() {
        assert!("lambda".parse::<DeploymentTarget>().is_err());
    }
}
