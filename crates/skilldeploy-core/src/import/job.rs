//! Submit a package for import and wait for the job to finish.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info};

use super::correlator::{BuildStatusCorrelator, CorrelatedOutcome};
use crate::error::DeployError;
use crate::poll::{Cancellation, RetryPolicy, retry};
use crate::smapi::{JobStatus, SmapiClient, SmapiTransport};
use crate::types::PackageType;

/// A remote import job. Terminal jobs never change again.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportJob {
    pub job_id: String,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
    pub terminal_body: Option<Value>,
}

impl ImportJob {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            submitted_at: Utc::now(),
            status: JobStatus::InProgress,
            terminal_body: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a terminal status. Returns false if the job was already terminal.
    pub fn finish(&mut self, status: JobStatus, body: Value) -> bool {
        if self.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.terminal_body = Some(body);
        true
    }
}

/// Successful import result.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub job: ImportJob,
    pub skill_id: String,
    pub warnings: Vec<String>,
}

/// Polling cadences for import jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportPolicies {
    /// Used while only the import resource decides completion.
    pub import: RetryPolicy,
    /// Used for advanced packages, whose loop spans both resources.
    pub build: RetryPolicy,
}

impl Default for ImportPolicies {
    fn default() -> Self {
        Self {
            import: RetryPolicy::import_status(),
            build: RetryPolicy::build_status(),
        }
    }
}

impl ImportPolicies {
    pub fn for_package(&self, package_type: PackageType) -> &RetryPolicy {
        if package_type.is_advanced() {
            &self.build
        } else {
            &self.import
        }
    }
}

/// Drives one import from submission to a terminal outcome.
#[derive(Debug)]
pub struct PackageImporter<'a, T> {
    client: &'a SmapiClient<T>,
    policies: ImportPolicies,
    cancellation: &'a Cancellation,
}

impl<'a, T: SmapiTransport> PackageImporter<'a, T> {
    pub fn new(
        client: &'a SmapiClient<T>,
        policies: ImportPolicies,
        cancellation: &'a Cancellation,
    ) -> Self {
        Self {
            client,
            policies,
            cancellation,
        }
    }

    /// Submit the package. A non-2xx response is fatal and not retried.
    pub async fn submit(
        &self,
        location: &str,
        vendor_id: &str,
        skill_id: Option<&str>,
    ) -> Result<ImportJob, DeployError> {
        let job_id = self
            .cancellation
            .guard(self.client.import_package(location, vendor_id, skill_id))
            .await??;
        info!(import_id = %job_id, skill_id = skill_id.unwrap_or("<new>"), "Package import started");
        Ok(ImportJob::new(job_id))
    }

    /// Poll until the job, and for advanced packages every locale build, is
    /// terminal.
    pub async fn await_completion(
        &self,
        job: &mut ImportJob,
        package_type: PackageType,
    ) -> Result<ImportOutcome, DeployError> {
        let correlator = BuildStatusCorrelator::new(self.client, package_type);
        let correlator = &correlator;
        let import_id = job.job_id.as_str();

        let outcome: CorrelatedOutcome = retry(
            self.policies.for_package(package_type),
            self.cancellation,
            move || correlator.poll_once(import_id),
            |outcome: &CorrelatedOutcome| !outcome.done,
        )
        .await?;
        let warnings = correlator.warnings().await;

        job.finish(outcome.import_status, outcome.import_body.clone());

        match (outcome.succeeded, outcome.skill_id) {
            (true, Some(skill_id)) => {
                info!(import_id = %job.job_id, skill_id = %skill_id, "Package import succeeded");
                Ok(ImportOutcome {
                    job: job.clone(),
                    skill_id,
                    warnings,
                })
            }
            _ => {
                error!(
                    import_id = %job.job_id,
                    failing_locales = ?outcome.failing_locales,
                    "Package import failed"
                );
                Err(DeployError::JobFailed {
                    body: failure_body(&outcome.import_body, outcome.build_body.as_ref()),
                    failing_locales: outcome.failing_locales,
                })
            }
        }
    }

    pub async fn submit_and_await(
        &self,
        location: &str,
        vendor_id: &str,
        skill_id: Option<&str>,
        package_type: PackageType,
    ) -> Result<ImportOutcome, DeployError> {
        let mut job = self.submit(location, vendor_id, skill_id).await?;
        self.await_completion(&mut job, package_type).await
    }
}

fn failure_body(import_body: &Value, build_body: Option<&Value>) -> String {
    match build_body {
        Some(build) => serde_json::json!({ "import": import_body, "build": build }).to_string(),
        None => import_body.to_string(),
    }
}
