//! Response bodies of the skill management API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Status of an asynchronous job or build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

/// A warning or error entry attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

/// `GET /v1/skills/imports/{importId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatusBody {
    pub status: JobStatus,
    #[serde(default)]
    pub skill: Option<ImportedSkill>,
    #[serde(default)]
    pub warnings: Vec<ApiMessage>,
}

impl ImportStatusBody {
    /// Assigned skill id, treating an empty string as absent.
    pub fn skill_id(&self) -> Option<&str> {
        self.skill
            .as_ref()
            .and_then(|s| s.skill_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    pub fn resources(&self) -> &[ImportedResource] {
        self.skill
            .as_ref()
            .map(|s| s.resources.as_slice())
            .unwrap_or(&[])
    }

    /// Locales named by `InteractionModel.<locale>` resources, sorted.
    pub fn referenced_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self
            .resources()
            .iter()
            .filter_map(|r| r.locale().map(str::to_string))
            .collect();
        locales.sort();
        locales.dedup();
        locales
    }

    /// Every warning message in the body, top-level first.
    pub fn warning_messages(&self) -> impl Iterator<Item = &str> {
        self.warnings
            .iter()
            .chain(self.resources().iter().flat_map(|r| r.warnings.iter()))
            .map(|w| w.message.as_str())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImportedSkill {
    #[serde(default, rename = "skillId")]
    pub skill_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<ImportedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub name: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub warnings: Vec<ApiMessage>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

impl ImportedResource {
    /// `InteractionModel.en-US` -> `en-US`.
    pub fn locale(&self) -> Option<&str> {
        self.name
            .strip_prefix("InteractionModel.")
            .filter(|locale| !locale.is_empty())
    }
}

/// `GET /v1/skills/{skillId}/status?resource=interactionModel`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuildStatusBody {
    #[serde(default, rename = "interactionModel")]
    pub interaction_model: BTreeMap<String, LocaleBuild>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocaleBuild {
    #[serde(default, rename = "lastUpdateRequest")]
    pub last_update_request: Option<UpdateRequest>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default, rename = "buildDetails")]
    pub build_details: Option<BuildDetails>,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BuildDetails {
    #[serde(default)]
    pub steps: Vec<BuildStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub name: String,
    pub status: JobStatus,
}

/// `GET /v1/skills/exports/{exportId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportStatusBody {
    pub status: JobStatus,
    #[serde(default)]
    pub skill: Option<ExportedSkill>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportedSkill {
    #[serde(default)]
    pub location: Option<String>,
}

/// `POST /v1/skills/uploads`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrlBody {
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}
