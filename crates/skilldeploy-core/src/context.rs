//! Application context for unified dependency injection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConfigStore, ProfileConfig, ProjectConfig};
use crate::deploy::DeploymentOrchestrator;
use crate::error::DeployError;
use crate::poll::Cancellation;
use crate::smapi::http::DEFAULT_API_ENDPOINT;
use crate::smapi::{HttpTransport, SmapiClient, SmapiTransport, TokenProvider};
use crate::state::DeployStateStore;

/// Profile used when none is given
pub const DEFAULT_PROFILE: &str = "default";

/// Everything a command needs, passed explicitly.
///
/// Frontends create this once and hand it to commands.
#[derive(Debug, Clone)]
pub struct AppContext {
    project_root: PathBuf,
    profile_name: String,
    config: ProjectConfig,
    cancellation: Cancellation,
    timeout: Option<Duration>,
}

impl AppContext {
    pub fn new(project_root: PathBuf, profile_name: impl Into<String>, config: ProjectConfig) -> Self {
        Self {
            project_root,
            profile_name: profile_name.into(),
            config,
            cancellation: Cancellation::none(),
            timeout: None,
        }
    }

    /// Load `skilldeploy.toml` from `project_root`.
    pub fn load(project_root: PathBuf, profile_name: impl Into<String>) -> anyhow::Result<Self> {
        let config = ConfigStore::from_project_root(&project_root).load()?;
        Ok(Self::new(project_root, profile_name, config))
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Override `polling.timeout_secs`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn profile(&self) -> anyhow::Result<&ProfileConfig> {
        self.config.profile(&self.profile_name)
    }

    pub fn api_endpoint(&self) -> &str {
        self.config
            .api_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_API_ENDPOINT)
    }

    /// Overall deadline, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .or_else(|| self.config.polling.timeout_secs.map(Duration::from_secs))
    }

    /// Cancellation with the deadline starting now.
    pub fn cancellation(&self) -> Cancellation {
        match self.timeout() {
            Some(timeout) => self.cancellation.clone().with_timeout(timeout),
            None => self.cancellation.clone(),
        }
    }

    pub fn state_store(&self) -> DeployStateStore {
        DeployStateStore::new(&self.project_root)
    }

    /// HTTP client against the configured endpoint.
    pub fn http_client(
        &self,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<SmapiClient<HttpTransport>, DeployError> {
        Ok(SmapiClient::new(HttpTransport::new(self.api_endpoint(), tokens)?))
    }

    /// Orchestrator for the selected profile with configured polling.
    pub fn orchestrator<T: SmapiTransport>(
        &self,
        client: SmapiClient<T>,
    ) -> anyhow::Result<DeploymentOrchestrator<T>> {
        let profile = self.profile()?.clone();
        Ok(DeploymentOrchestrator::new(
            client,
            self.state_store(),
            self.project_root.clone(),
            self.profile_name.clone(),
            profile,
        )
        .with_policies(self.config.polling.import_policies())
        .with_cancellation(self.cancellation()))
    }
}
