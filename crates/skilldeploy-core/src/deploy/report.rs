//! Deploy outcome reporting.

use std::fmt;

use crate::error::DeployError;
use crate::types::{DeployStage, DeploymentTarget};

/// How a stage that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Nothing to do; not an error.
    Skipped { reason: String },
    Deployed,
    /// Finished with a downgraded failure.
    Warned { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: DeployStage,
    pub status: StageStatus,
}

/// The stage that stopped the deploy.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: DeployStage,
    pub skill_id: Option<String>,
    pub error: DeployError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.stage)?;
        if let Some(skill_id) = &self.skill_id {
            write!(f, "skill {}: ", skill_id)?;
        }
        write!(f, "{}", self.error)?;
        if let DeployError::JobFailed {
            failing_locales, ..
        } = &self.error
            && !failing_locales.is_empty()
        {
            write!(f, " (failing locales: {})", failing_locales.join(", "))?;
        }
        Ok(())
    }
}

/// Result of one deploy invocation.
#[derive(Debug)]
pub struct DeployReport {
    pub profile: String,
    pub target: DeploymentTarget,
    /// Skill id known at the end of the run
    pub skill_id: Option<String>,
    pub stages: Vec<StageOutcome>,
    pub warnings: Vec<String>,
    pub failure: Option<StageFailure>,
}

impl DeployReport {
    pub fn new(profile: impl Into<String>, target: DeploymentTarget) -> Self {
        Self {
            profile: profile.into(),
            target,
            skill_id: None,
            stages: Vec::new(),
            warnings: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn outcome(&self, stage: DeployStage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|o| o.stage == stage)
            .map(|o| &o.status)
    }

    pub(crate) fn record(&mut self, stage: DeployStage, status: StageStatus) {
        self.stages.push(StageOutcome { stage, status });
    }

    pub(crate) fn fail(&mut self, stage: DeployStage, error: DeployError) {
        self.failure = Some(StageFailure {
            stage,
            skill_id: self.skill_id.clone(),
            error,
        });
    }
}
