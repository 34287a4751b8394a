//! Export a skill stage as a downloadable package.

use tracing::info;

use crate::error::DeployError;
use crate::poll::{Cancellation, RetryPolicy, retry};
use crate::smapi::model::ExportStatusBody;
use crate::smapi::{JobStatus, SmapiClient, SmapiTransport, StatusResponse};
use crate::types::SkillStage;

#[derive(Debug)]
pub struct PackageExporter<'a, T> {
    client: &'a SmapiClient<T>,
    policy: RetryPolicy,
    cancellation: &'a Cancellation,
}

impl<'a, T: SmapiTransport> PackageExporter<'a, T> {
    pub fn new(
        client: &'a SmapiClient<T>,
        policy: RetryPolicy,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            client,
            policy,
            cancellation,
        }
    }

    /// Request an export and wait for the package location.
    pub async fn submit_and_await(
        &self,
        skill_id: &str,
        stage: SkillStage,
    ) -> Result<String, DeployError> {
        let export_id = self
            .cancellation
            .guard(self.client.export_package(skill_id, stage))
            .await??;
        info!(export_id = %export_id, skill_id, stage = stage.as_str(), "Package export started");

        let client = self.client;
        let export_id_ref = export_id.as_str();
        let response: StatusResponse<ExportStatusBody> = retry(
            &self.policy,
            self.cancellation,
            move || client.get_export_status(export_id_ref),
            |response: &StatusResponse<ExportStatusBody>| {
                response.body.status == JobStatus::InProgress
            },
        )
        .await?;

        match response.body.status {
            JobStatus::Succeeded => {
                let location = response
                    .body
                    .skill
                    .and_then(|s| s.location)
                    .filter(|l| !l.is_empty())
                    .ok_or_else(|| {
                        DeployError::InvalidResponse(format!(
                            "Export succeeded without a package location: {}",
                            response.raw
                        ))
                    })?;
                info!(export_id = %export_id, "Package export succeeded");
                Ok(location)
            }
            _ => Err(DeployError::JobFailed {
                body: response.raw.to_string(),
                failing_locales: Vec::new(),
            }),
        }
    }
}
