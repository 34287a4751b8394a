//! Status command: report persisted deploy state without network calls.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::context::AppContext;
use crate::state::InfrastructureState;

/// Status of one profile
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub profile: String,
    pub state_path: PathBuf,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub skill_id: Option<String>,
    pub metadata_hash: Option<String>,
    pub code: BTreeMap<String, Option<String>>,
    pub infrastructure: Option<InfrastructureState>,
}

impl StatusReport {
    pub fn is_deployed(&self) -> bool {
        self.skill_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct StatusCommand {
    context: AppContext,
}

impl StatusCommand {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    pub fn execute(&self) -> anyhow::Result<StatusReport> {
        let store = self.context.state_store();
        let exists = store.state_path().exists();
        let state = store.load()?;
        let profile = state.profile(self.context.profile_name());

        Ok(StatusReport {
            profile: self.context.profile_name().to_string(),
            state_path: store.state_path().to_path_buf(),
            updated_at: exists.then_some(state.updated_at),
            skill_id: profile.and_then(|p| p.skill_id()).map(str::to_string),
            metadata_hash: profile.and_then(|p| p.skill_metadata.last_deploy_hash.clone()),
            code: profile
                .map(|p| {
                    p.code
                        .iter()
                        .map(|(region, h)| (region.clone(), h.last_deploy_hash.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            infrastructure: profile.and_then(|p| p.skill_infrastructure.clone()),
        })
    }
}
