//! Stage sequencing for one deploy invocation.
//!
//! Stages run strictly in order: metadata, code, infrastructure, enablement.
//! Each stage writes its own slice of the persisted state as its last step,
//! so a later failure never rolls back what an earlier stage produced.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use super::delegates::{
    CodeArtifact, CodeBuildRequest, CodeBuilder, CommandCodeBuilder,
    CommandInfrastructureDeployer, InfrastructureDeployer, InfrastructureRequest,
    InfrastructureResult,
};
use super::hash_gate::HashGate;
use super::report::{DeployReport, StageStatus};
use crate::config::{InfrastructureConfig, ProfileConfig};
use crate::error::DeployError;
use crate::fs::zip_package;
use crate::import::{ImportPolicies, PackageImporter};
use crate::poll::Cancellation;
use crate::smapi::{Enablement, SmapiClient, SmapiTransport};
use crate::state::{DeployState, DeployStateStore, InfrastructureState, StageHash};
use crate::types::{DeployStage, DeploymentTarget, SkillStage};

/// Options for a deploy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub target: DeploymentTarget,
    /// Import even when the package hash is unchanged
    pub ignore_hash: bool,
}

impl DeployOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: DeploymentTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_ignore_hash(mut self, ignore_hash: bool) -> Self {
        self.ignore_hash = ignore_hash;
        self
    }
}

/// Metadata stage result. "No changes" is a value, not an error.
#[derive(Debug)]
pub enum MetadataOutcome {
    Skipped {
        current_hash: String,
    },
    Deployed {
        skill_id: String,
        current_hash: String,
        warnings: Vec<String>,
    },
    Failed(DeployError),
}

pub struct DeploymentOrchestrator<T> {
    client: SmapiClient<T>,
    store: DeployStateStore,
    project_root: PathBuf,
    profile_name: String,
    profile: ProfileConfig,
    policies: ImportPolicies,
    cancellation: Cancellation,
    code_builder: Arc<dyn CodeBuilder>,
    infrastructure: Arc<dyn InfrastructureDeployer>,
}

impl<T> fmt::Debug for DeploymentOrchestrator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("project_root", &self.project_root)
            .field("profile_name", &self.profile_name)
            .field("policies", &self.policies)
            .finish_non_exhaustive()
    }
}

impl<T: SmapiTransport> DeploymentOrchestrator<T> {
    pub fn new(
        client: SmapiClient<T>,
        store: DeployStateStore,
        project_root: PathBuf,
        profile_name: impl Into<String>,
        profile: ProfileConfig,
    ) -> Self {
        Self {
            client,
            store,
            project_root,
            profile_name: profile_name.into(),
            profile,
            policies: ImportPolicies::default(),
            cancellation: Cancellation::none(),
            code_builder: Arc::new(CommandCodeBuilder),
            infrastructure: Arc::new(CommandInfrastructureDeployer),
        }
    }

    pub fn with_policies(mut self, policies: ImportPolicies) -> Self {
        self.policies = policies;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_code_builder(mut self, builder: impl CodeBuilder + 'static) -> Self {
        self.code_builder = Arc::new(builder);
        self
    }

    pub fn with_infrastructure_deployer(
        mut self,
        deployer: impl InfrastructureDeployer + 'static,
    ) -> Self {
        self.infrastructure = Arc::new(deployer);
        self
    }

    pub fn client(&self) -> &SmapiClient<T> {
        &self.client
    }

    pub fn store(&self) -> &DeployStateStore {
        &self.store
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    /// Run the stages selected by `options.target`.
    ///
    /// Never panics on stage failure; the failing stage is recorded on the
    /// returned report and later stages are not attempted.
    pub async fn deploy(&self, options: &DeployOptions) -> DeployReport {
        let target = options.target;
        let mut report = DeployReport::new(&self.profile_name, target);

        let state = match self.store.load() {
            Ok(state) => state,
            Err(e) => {
                report.fail(first_stage(target), DeployError::storage(e));
                return report;
            }
        };
        report.skill_id = state.skill_id(&self.profile_name).map(str::to_string);

        // Infrastructure without a metadata stage needs an existing skill.
        if target.runs_infrastructure() && !target.runs_metadata() && report.skill_id.is_none() {
            report.fail(DeployStage::Infrastructure, self.missing_skill_id());
            return report;
        }

        if target.runs_metadata() && !self.run_metadata_stage(&state, options, &mut report).await {
            return report;
        }

        let mut code_hashes: BTreeMap<String, String> = state
            .profile(&self.profile_name)
            .map(|p| {
                p.code
                    .iter()
                    .filter_map(|(region, h)| Some((region.clone(), h.last_deploy_hash.clone()?)))
                    .collect()
            })
            .unwrap_or_default();

        if target.runs_code() && !self.run_code_stage(&mut code_hashes, &mut report).await {
            return report;
        }

        if target.runs_infrastructure()
            && !self.run_infrastructure_stage(code_hashes, &mut report).await
        {
            return report;
        }

        if target.runs_enablement() {
            self.run_enablement_stage(&mut report).await;
        }

        report
    }

    async fn run_metadata_stage(
        &self,
        state: &DeployState,
        options: &DeployOptions,
        report: &mut DeployReport,
    ) -> bool {
        match self.deploy_metadata(state, options.ignore_hash).await {
            MetadataOutcome::Skipped { current_hash } => {
                info!(
                    profile = %self.profile_name,
                    hash = %current_hash,
                    "Skill package unchanged, skipping import"
                );
                report.record(
                    DeployStage::Metadata,
                    StageStatus::Skipped {
                        reason: "The hash of current skill package folder does not change \
                                 compared to the last deploy hash result"
                            .to_string(),
                    },
                );
                true
            }
            MetadataOutcome::Deployed {
                skill_id,
                current_hash,
                warnings,
            } => {
                let persisted = self.store.update(|state| {
                    let profile = state.profile_mut(&self.profile_name);
                    profile.skill_id = Some(skill_id.clone());
                    profile.skill_metadata = StageHash::new(current_hash);
                });
                report.skill_id = Some(skill_id);
                report.warnings.extend(warnings);
                if let Err(e) = persisted {
                    report.fail(DeployStage::Metadata, DeployError::storage(e));
                    return false;
                }
                report.record(DeployStage::Metadata, StageStatus::Deployed);
                true
            }
            MetadataOutcome::Failed(err) => {
                report.fail(DeployStage::Metadata, err);
                false
            }
        }
    }

    async fn run_code_stage(
        &self,
        code_hashes: &mut BTreeMap<String, String>,
        report: &mut DeployReport,
    ) -> bool {
        if self.profile.code.is_empty() {
            report.record(
                DeployStage::Code,
                StageStatus::Skipped {
                    reason: "no code regions configured".to_string(),
                },
            );
            return true;
        }

        let artifacts = match self.build_code().await {
            Ok(artifacts) => artifacts,
            Err(err) => {
                report.fail(DeployStage::Code, err);
                return false;
            }
        };

        let persisted = self.store.update(|state| {
            let profile = state.profile_mut(&self.profile_name);
            for artifact in &artifacts {
                profile
                    .code
                    .insert(artifact.region.clone(), StageHash::new(artifact.hash.clone()));
            }
        });
        if let Err(e) = persisted {
            report.fail(DeployStage::Code, DeployError::storage(e));
            return false;
        }

        for artifact in artifacts {
            code_hashes.insert(artifact.region, artifact.hash);
        }
        report.record(DeployStage::Code, StageStatus::Deployed);
        true
    }

    async fn run_infrastructure_stage(
        &self,
        code_hashes: BTreeMap<String, String>,
        report: &mut DeployReport,
    ) -> bool {
        let Some(config) = &self.profile.infrastructure else {
            report.record(
                DeployStage::Infrastructure,
                StageStatus::Skipped {
                    reason: "no infrastructure configured".to_string(),
                },
            );
            return true;
        };
        let Some(skill_id) = report.skill_id.clone() else {
            report.fail(DeployStage::Infrastructure, self.missing_skill_id());
            return false;
        };

        let result = match self
            .deploy_infrastructure(config, skill_id, code_hashes)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                report.fail(DeployStage::Infrastructure, err);
                return false;
            }
        };

        let persisted = self.store.update(|state| {
            state.profile_mut(&self.profile_name).skill_infrastructure =
                Some(InfrastructureState {
                    kind: result.kind,
                    deploy_state: result.deploy_state,
                });
        });
        if let Err(e) = persisted {
            report.fail(DeployStage::Infrastructure, DeployError::storage(e));
            return false;
        }
        report.record(DeployStage::Infrastructure, StageStatus::Deployed);
        true
    }

    /// Enablement is best effort; only cancellation fails the deploy here.
    async fn run_enablement_stage(&self, report: &mut DeployReport) {
        let Some(skill_id) = report.skill_id.clone() else {
            report.record(
                DeployStage::Enablement,
                StageStatus::Skipped {
                    reason: "no skill id recorded".to_string(),
                },
            );
            return;
        };

        match self.enable(&skill_id).await {
            Ok(Enablement::Enabled) => report.record(
                DeployStage::Enablement,
                StageStatus::Skipped {
                    reason: "skill already enabled".to_string(),
                },
            ),
            Ok(Enablement::NotEnabled) => {
                report.record(DeployStage::Enablement, StageStatus::Deployed)
            }
            Err(err) if err.is_abandoned() => report.fail(DeployStage::Enablement, err),
            Err(err) => {
                let message = format!("{} failed: {}", DeployStage::Enablement, err);
                warn!(skill_id = %skill_id, error = %err, "Skill enablement failed");
                report.warnings.push(message.clone());
                report.record(DeployStage::Enablement, StageStatus::Warned { message });
            }
        }
    }

    /// Hash-gate, upload and import the skill package.
    pub async fn deploy_metadata(&self, state: &DeployState, ignore_hash: bool) -> MetadataOutcome {
        match self.try_deploy_metadata(state, ignore_hash).await {
            Ok(outcome) => outcome,
            Err(err) => MetadataOutcome::Failed(err),
        }
    }

    async fn try_deploy_metadata(
        &self,
        state: &DeployState,
        ignore_hash: bool,
    ) -> Result<MetadataOutcome, DeployError> {
        let skill_id = state.skill_id(&self.profile_name);
        let vendor_id = match (skill_id, self.profile.vendor_id.as_deref()) {
            (None, None) => {
                return Err(DeployError::Precondition(format!(
                    "vendor_id is required in profile '{}' to create a new skill",
                    self.profile_name
                )));
            }
            (_, vendor_id) => vendor_id.unwrap_or_default(),
        };

        let package_dir = self.project_root.join(&self.profile.skill_package);
        let decision = {
            let state = state.clone();
            let profile = self.profile_name.clone();
            let dir = package_dir.clone();
            self.run_blocking(move || HashGate::new(&state).should_skip(&profile, &dir))
                .await?
                .map_err(DeployError::package)?
        };
        if decision.skip && !ignore_hash {
            return Ok(MetadataOutcome::Skipped {
                current_hash: decision.current_hash,
            });
        }

        let bytes = self
            .run_blocking(move || zip_package(&package_dir))
            .await?
            .map_err(DeployError::package)?;
        let size = bytes.len();
        let upload_url = self
            .cancellation
            .guard(self.client.create_upload_url())
            .await??;
        self.cancellation
            .guard(self.client.upload_package(&upload_url, bytes))
            .await??;
        info!(profile = %self.profile_name, bytes = size, "Skill package uploaded");

        let importer = PackageImporter::new(&self.client, self.policies, &self.cancellation);
        let outcome = importer
            .submit_and_await(&upload_url, vendor_id, skill_id, self.profile.package_type)
            .await?;

        Ok(MetadataOutcome::Deployed {
            skill_id: outcome.skill_id,
            current_hash: decision.current_hash,
            warnings: outcome.warnings,
        })
    }

    /// Build every region concurrently; all failures are collected.
    ///
    /// On cancellation the stage returns without waiting: build processes
    /// already started run to completion in the blocking pool and their
    /// results are discarded, so nothing is persisted for them.
    async fn build_code(&self) -> Result<Vec<CodeArtifact>, DeployError> {
        let mut tasks = JoinSet::new();
        for (region, config) in &self.profile.code {
            let builder = Arc::clone(&self.code_builder);
            let request = CodeBuildRequest {
                profile: self.profile_name.clone(),
                region: region.clone(),
                src: self.project_root.join(&config.src),
                build: config.build.clone(),
            };
            tasks.spawn_blocking(move || {
                let result = builder.build(&request);
                (request.region, result)
            });
        }

        let (artifacts, errors) = self.cancellation.guard(join_builds(&mut tasks)).await?;
        if !errors.is_empty() {
            return Err(DeployError::Delegate {
                stage: DeployStage::Code.to_string(),
                message: errors.join("; "),
            });
        }
        for artifact in &artifacts {
            info!(region = %artifact.region, hash = %artifact.hash, "Code built");
        }
        Ok(artifacts)
    }

    async fn deploy_infrastructure(
        &self,
        config: &InfrastructureConfig,
        skill_id: String,
        regions: BTreeMap<String, String>,
    ) -> Result<InfrastructureResult, DeployError> {
        let request = InfrastructureRequest {
            profile: self.profile_name.clone(),
            skill_id,
            project_root: self.project_root.clone(),
            kind: config.kind.clone(),
            command: config.command.clone(),
            regions,
        };
        let deployer = Arc::clone(&self.infrastructure);
        let result = self
            .run_blocking(move || deployer.deploy(&request))
            .await?
            .map_err(|e| DeployError::Delegate {
                stage: DeployStage::Infrastructure.to_string(),
                message: format!("{e:#}"),
            })?;
        info!(profile = %self.profile_name, kind = %result.kind, "Skill infrastructure deployed");
        Ok(result)
    }

    /// Returns the enablement found before any change was made.
    async fn enable(&self, skill_id: &str) -> Result<Enablement, DeployError> {
        let stage = SkillStage::Development;
        let current = self
            .cancellation
            .guard(self.client.get_enablement(skill_id, stage))
            .await??;
        if current == Enablement::NotEnabled {
            self.cancellation
                .guard(self.client.enable_skill(skill_id, stage))
                .await??;
            info!(skill_id, stage = stage.as_str(), "Skill enabled");
        }
        Ok(current)
    }

    async fn run_blocking<R, F>(&self, f: F) -> Result<anyhow::Result<R>, DeployError>
    where
        F: FnOnce() -> anyhow::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.cancellation
            .guard(tokio::task::spawn_blocking(f))
            .await?
            .map_err(|e| DeployError::Package(format!("Background task failed: {}", e)))
    }

    fn missing_skill_id(&self) -> DeployError {
        DeployError::Precondition(format!(
            "No skill id recorded for profile '{}'. Deploy the skill metadata first",
            self.profile_name
        ))
    }
}

type BuildTask = (String, anyhow::Result<CodeArtifact>);

async fn join_builds(tasks: &mut JoinSet<BuildTask>) -> (Vec<CodeArtifact>, Vec<String>) {
    let mut artifacts = Vec::new();
    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(artifact))) => artifacts.push(artifact),
            Ok((region, Err(e))) => errors.push(format!("region {}: {:#}", region, e)),
            Err(e) => errors.push(format!("build task failed: {}", e)),
        }
    }
    artifacts.sort_by(|a, b| a.region.cmp(&b.region));
    errors.sort();
    (artifacts, errors)
}

fn first_stage(target: DeploymentTarget) -> DeployStage {
    if target.runs_metadata() {
        DeployStage::Metadata
    } else {
        DeployStage::Code
    }
}
