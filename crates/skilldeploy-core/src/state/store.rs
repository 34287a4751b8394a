//! Deploy state persistence under the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::DeployState;

/// Directory holding tool state, relative to the project root
pub const STATE_DIR_NAME: &str = ".skilldeploy";

/// State file name inside [`STATE_DIR_NAME`]
pub const STATE_FILE_NAME: &str = "deploy-state.json";

/// Loads and atomically saves `.skilldeploy/deploy-state.json`.
#[derive(Debug, Clone)]
pub struct DeployStateStore {
    state_path: PathBuf,
}

impl DeployStateStore {
    pub fn new(project_root: &Path) -> Self {
        Self::from_path(project_root.join(STATE_DIR_NAME).join(STATE_FILE_NAME))
    }

    pub fn from_path(state_path: PathBuf) -> Self {
        Self { state_path }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Load state from disk
    ///
    /// Returns an empty state if the file doesn't exist.
    pub fn load(&self) -> anyhow::Result<DeployState> {
        if !self.state_path.exists() {
            return Ok(DeployState::new());
        }

        let bytes = fs::read(&self.state_path).with_context(|| {
            format!("Failed to read deploy state: {}", self.state_path.display())
        })?;
        let state: DeployState = serde_json::from_slice(&bytes).with_context(|| {
            format!("Failed to parse deploy state: {}", self.state_path.display())
        })?;
        state.validate()?;
        Ok(state)
    }

    /// Save state atomically (tmp + rename)
    pub fn save(&self, state: &DeployState) -> anyhow::Result<()> {
        let dir = self
            .state_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Invalid state path: {}", self.state_path.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;

        let tmp_path = dir.join(format!("{}.{}.tmp", STATE_FILE_NAME, std::process::id()));
        let bytes = serde_json::to_vec_pretty(state).context("Failed to serialize deploy state")?;

        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp state: {}", tmp_path.display()))?;

        if self.state_path.exists() {
            fs::remove_file(&self.state_path).with_context(|| {
                format!(
                    "Failed to remove existing state: {}",
                    self.state_path.display()
                )
            })?;
        }
        fs::rename(&tmp_path, &self.state_path)
            .with_context(|| format!("Failed to rename tmp state: {}", tmp_path.display()))?;

        Ok(())
    }

    /// Load, apply `f`, stamp `updatedAt` and save.
    pub fn update<R>(&self, f: impl FnOnce(&mut DeployState) -> R) -> anyhow::Result<R> {
        let mut state = self.load()?;
        let out = f(&mut state);
        state.updated_at = chrono::Utc::now();
        self.save(&state)?;
        Ok(out)
    }
}
