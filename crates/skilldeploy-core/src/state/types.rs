//! Persisted deploy state
//!
//! One record per profile: the assigned skill id plus the hashes and
//! markers each stage produced the last time it succeeded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployState {
    /// State file format version
    pub version: u32,

    /// When the state was last written
    pub updated_at: chrono::DateTime<chrono::Utc>,

    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileState>,
}

impl DeployState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: chrono::Utc::now(),
            profiles: BTreeMap::new(),
        }
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileState> {
        self.profiles.get(name)
    }

    /// Mutable record for `name`, created empty on first use.
    pub fn profile_mut(&mut self, name: &str) -> &mut ProfileState {
        self.profiles.entry(name.to_string()).or_default()
    }

    pub fn skill_id(&self, profile: &str) -> Option<&str> {
        self.profile(profile).and_then(ProfileState::skill_id)
    }

    /// Hash record for the metadata stage of `profile`.
    pub fn hash_record(&self, profile: &str) -> Option<HashRecord> {
        let hash = self
            .profile(profile)?
            .skill_metadata
            .last_deploy_hash
            .clone()?;
        Some(HashRecord {
            profile_id: profile.to_string(),
            last_deploy_hash: hash,
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.version != STATE_VERSION {
            anyhow::bail!("Unsupported deploy state version: {}", self.version);
        }
        Ok(())
    }
}

impl Default for DeployState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,

    #[serde(default)]
    pub skill_metadata: StageHash,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub code: BTreeMap<String, StageHash>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_infrastructure: Option<InfrastructureState>,
}

impl ProfileState {
    pub fn skill_id(&self) -> Option<&str> {
        self.skill_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_deploy_hash: Option<String>,
}

impl StageHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            last_deploy_hash: Some(hash.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureState {
    /// Deployment-type marker
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub deploy_state: Value,
}

/// Last deployed metadata hash of one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub profile_id: String,
    pub last_deploy_hash: String,
}
