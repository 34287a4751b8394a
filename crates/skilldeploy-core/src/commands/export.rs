//! Export command implementation.
//!
//! Exports a skill stage, downloads the package into the profile's package
//! directory and records its hash so the next deploy is a no-op.

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::context::AppContext;
use crate::error::DeployError;
use crate::fs::{extract_package, hash_tree};
use crate::import::PackageExporter;
use crate::smapi::{SmapiClient, SmapiTransport};
use crate::state::StageHash;
use crate::types::SkillStage;

/// Options for the export command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub stage: SkillStage,
    /// Replace an existing, non-empty package directory
    pub force: bool,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: SkillStage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Result of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub skill_id: String,
    pub stage: SkillStage,
    pub package_dir: PathBuf,
    pub files: usize,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct ExportCommand {
    context: AppContext,
}

impl ExportCommand {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    pub async fn execute<T: SmapiTransport>(
        &self,
        client: &SmapiClient<T>,
        options: &ExportOptions,
    ) -> anyhow::Result<ExportReport> {
        let profile_name = self.context.profile_name();
        let profile = self.context.profile()?;
        let store = self.context.state_store();
        let state = store.load()?;
        let skill_id = state
            .skill_id(profile_name)
            .ok_or_else(|| {
                DeployError::Precondition(format!(
                    "No skill id recorded for profile '{}'",
                    profile_name
                ))
            })?
            .to_string();

        let package_dir = self.context.project_root().join(&profile.skill_package);
        if !options.force && is_non_empty_dir(&package_dir)? {
            anyhow::bail!(
                "Package directory {} already exists. Use --force to replace it",
                package_dir.display()
            );
        }

        let cancellation = self.context.cancellation();
        let exporter = PackageExporter::new(
            client,
            self.context.config().polling.export_policy(),
            &cancellation,
        );
        let location = exporter.submit_and_await(&skill_id, options.stage).await?;
        let bytes = cancellation.guard(client.download(&location)).await??;
        info!(skill_id = %skill_id, bytes = bytes.len(), "Skill package downloaded");

        if package_dir.exists() {
            std::fs::remove_dir_all(&package_dir).with_context(|| {
                format!("Failed to remove package directory: {}", package_dir.display())
            })?;
        }
        let files = extract_package(&bytes, &package_dir)?;
        let hash = hash_tree(&package_dir)?;

        store.update(|state| {
            state.profile_mut(profile_name).skill_metadata = StageHash::new(hash.clone());
        })?;

        Ok(ExportReport {
            skill_id,
            stage: options.stage,
            package_dir,
            files,
            hash,
        })
    }
}

fn is_non_empty_dir(path: &std::path::Path) -> anyhow::Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read directory: {}", path.display()))?;
    Ok(entries.next().is_some())
}
