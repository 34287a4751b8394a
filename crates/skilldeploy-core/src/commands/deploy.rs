//! Deploy command implementation.

use crate::context::AppContext;
use crate::deploy::{DeployOptions, DeployReport};
use crate::smapi::{SmapiClient, SmapiTransport};

/// Runs a deploy for the context's profile.
#[derive(Debug, Clone)]
pub struct DeployCommand {
    context: AppContext,
}

impl DeployCommand {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Errors only on setup problems (unknown profile); stage failures are
    /// carried on the report.
    pub async fn execute<T: SmapiTransport>(
        &self,
        client: SmapiClient<T>,
        options: &DeployOptions,
    ) -> anyhow::Result<DeployReport> {
        let orchestrator = self.context.orchestrator(client)?;
        tracing::debug!(
            profile = self.context.profile_name(),
            target = ?options.target,
            ignore_hash = options.ignore_hash,
            "Starting deploy"
        );
        Ok(orchestrator.deploy(options).await)
    }
}
