//! Config store for loading skilldeploy.toml.

use std::path::{Path, PathBuf};

use super::{CONFIG_FILE_NAME, ProjectConfig, parser};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_project_root(project_root: &Path) -> Self {
        Self {
            config_path: project_root.join(CONFIG_FILE_NAME),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Missing file yields an empty configuration.
    pub fn load(&self) -> anyhow::Result<ProjectConfig> {
        if !self.config_path.exists() {
            return Ok(ProjectConfig::new());
        }
        parser::parse_project_toml(&self.config_path)
    }
}
