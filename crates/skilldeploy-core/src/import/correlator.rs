//! Merge the import-status and per-locale build-status resources into one
//! completion signal.
//!
//! For advanced packages the import resource can report `SUCCEEDED` while
//! per-locale builds are still running. The build resource is only queried
//! once the import resource is terminal, never concurrently with it.

use std::collections::HashSet;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::DeployError;
use crate::smapi::model::{BuildStatusBody, BuildStep, ImportStatusBody, JobStatus};
use crate::smapi::{SmapiClient, SmapiTransport};
use crate::types::PackageType;

/// Build steps of one locale, from the build-status resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleBuildStatus {
    pub locale: String,
    pub request_status: Option<JobStatus>,
    pub steps: Vec<BuildStep>,
}

impl LocaleBuildStatus {
    /// One entry per locale, sorted by locale.
    pub fn from_body(body: &BuildStatusBody) -> Vec<Self> {
        body.interaction_model
            .iter()
            .map(|(locale, build)| {
                let request = build.last_update_request.as_ref();
                Self {
                    locale: locale.clone(),
                    request_status: request.and_then(|r| r.status),
                    steps: request
                        .and_then(|r| r.build_details.as_ref())
                        .map(|d| d.steps.clone())
                        .unwrap_or_default(),
                }
            })
            .collect()
    }

    /// No step, and not the request itself, is still in progress.
    pub fn is_complete(&self) -> bool {
        self.request_status != Some(JobStatus::InProgress)
            && self.steps.iter().all(|s| s.status.is_terminal())
    }

    pub fn is_failed(&self) -> bool {
        self.request_status == Some(JobStatus::Failed)
            || self.steps.iter().any(|s| s.status == JobStatus::Failed)
    }
}

/// Where the correlated poll currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationPhase {
    PollingImport,
    PollingBuild,
    Done,
    DoneWithFailures,
}

/// One round's merged view of both resources.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedOutcome {
    pub done: bool,
    pub succeeded: bool,
    pub failing_locales: Vec<String>,
    pub phase: CorrelationPhase,
    pub import_status: JobStatus,
    pub skill_id: Option<String>,
    pub import_body: Value,
    pub build_body: Option<Value>,
}

impl CorrelatedOutcome {
    fn pending(import: &ImportStatusBody, phase: CorrelationPhase) -> Self {
        Self {
            done: false,
            succeeded: false,
            failing_locales: Vec::new(),
            phase,
            import_status: import.status,
            skill_id: import.skill_id().map(str::to_string),
            import_body: Value::Null,
            build_body: None,
        }
    }

    fn finished(import: &ImportStatusBody, mut failing_locales: Vec<String>) -> Self {
        failing_locales.sort();
        failing_locales.dedup();
        let succeeded = import.status == JobStatus::Succeeded && failing_locales.is_empty();
        Self {
            done: true,
            succeeded,
            failing_locales,
            phase: if succeeded {
                CorrelationPhase::Done
            } else {
                CorrelationPhase::DoneWithFailures
            },
            import_status: import.status,
            skill_id: import.skill_id().map(str::to_string),
            import_body: Value::Null,
            build_body: None,
        }
    }
}

/// Whether this import body calls for a build-status query.
pub fn needs_build_status(import: &ImportStatusBody, package_type: PackageType) -> bool {
    package_type.is_advanced()
        && import.status.is_terminal()
        && import.skill_id().is_some()
        && !import.referenced_locales().is_empty()
}

/// Merge one import body and, for advanced packages, the locale builds.
///
/// `builds` is `None` when the build resource was not queried this round.
pub fn correlate(
    import: &ImportStatusBody,
    package_type: PackageType,
    builds: Option<&[LocaleBuildStatus]>,
) -> CorrelatedOutcome {
    if !import.status.is_terminal() {
        return CorrelatedOutcome::pending(import, CorrelationPhase::PollingImport);
    }

    if import.skill_id().is_none() {
        // The id has not propagated yet; only a failure is final here.
        return match import.status {
            JobStatus::Failed => CorrelatedOutcome::finished(import, failed_import_locales(import)),
            _ => CorrelatedOutcome::pending(import, CorrelationPhase::PollingImport),
        };
    }

    let referenced = import.referenced_locales();
    if !package_type.is_advanced() || referenced.is_empty() {
        return CorrelatedOutcome::finished(import, failed_import_locales(import));
    }

    let mut failing = failed_import_locales(import);

    // A failed import is final; the build query only attributes locales.
    if import.status == JobStatus::Failed {
        failing.extend(
            builds
                .unwrap_or_default()
                .iter()
                .filter(|b| referenced.contains(&b.locale) && b.is_complete() && b.is_failed())
                .map(|b| b.locale.clone()),
        );
        return CorrelatedOutcome::finished(import, failing);
    }

    let Some(builds) = builds else {
        return CorrelatedOutcome::pending(import, CorrelationPhase::PollingBuild);
    };

    for locale in &referenced {
        match builds.iter().find(|b| &b.locale == locale) {
            Some(build) if build.is_complete() => {
                if build.is_failed() {
                    failing.push(locale.clone());
                }
            }
            _ => return CorrelatedOutcome::pending(import, CorrelationPhase::PollingBuild),
        }
    }

    CorrelatedOutcome::finished(import, failing)
}

fn failed_import_locales(import: &ImportStatusBody) -> Vec<String> {
    import
        .resources()
        .iter()
        .filter(|r| r.status == Some(JobStatus::Failed))
        .filter_map(|r| r.locale().map(str::to_string))
        .collect()
}

/// Stateful poller for one import job.
///
/// Tracks warnings across rounds so each distinct message is logged once.
#[derive(Debug)]
pub struct BuildStatusCorrelator<'a, T> {
    client: &'a SmapiClient<T>,
    package_type: PackageType,
    state: Mutex<CorrelatorState>,
}

#[derive(Debug)]
struct CorrelatorState {
    seen_warnings: HashSet<String>,
    warnings: Vec<String>,
    phase: CorrelationPhase,
}

impl<'a, T: SmapiTransport> BuildStatusCorrelator<'a, T> {
    pub fn new(client: &'a SmapiClient<T>, package_type: PackageType) -> Self {
        Self {
            client,
            package_type,
            state: Mutex::new(CorrelatorState {
                seen_warnings: HashSet::new(),
                warnings: Vec::new(),
                phase: CorrelationPhase::PollingImport,
            }),
        }
    }

    /// One round: import status, then build status if the import is terminal.
    pub async fn poll_once(&self, import_id: &str) -> Result<CorrelatedOutcome, DeployError> {
        let import = self.client.get_import_status(import_id).await?;
        self.record_warnings(&import.body).await;

        let mut outcome = match import.body.skill_id() {
            Some(skill_id) if needs_build_status(&import.body, self.package_type) => {
                let build = self.client.get_build_status(skill_id).await?;
                let locales = LocaleBuildStatus::from_body(&build.body);
                let mut outcome = correlate(&import.body, self.package_type, Some(&locales));
                outcome.build_body = Some(build.raw);
                outcome
            }
            _ => correlate(&import.body, self.package_type, None),
        };
        outcome.import_body = import.raw;

        let mut state = self.state.lock().await;
        if state.phase != outcome.phase {
            debug!(
                import_id,
                from = ?state.phase,
                to = ?outcome.phase,
                "import correlation phase changed"
            );
            state.phase = outcome.phase;
        }

        Ok(outcome)
    }

    /// Distinct warnings seen so far, in first-seen order.
    pub async fn warnings(&self) -> Vec<String> {
        self.state.lock().await.warnings.clone()
    }

    pub async fn phase(&self) -> CorrelationPhase {
        self.state.lock().await.phase
    }

    async fn record_warnings(&self, body: &ImportStatusBody) {
        let mut state = self.state.lock().await;
        for message in body.warning_messages() {
            if state.seen_warnings.insert(message.to_string()) {
                warn!(warning = message, "service reported a warning");
                state.warnings.push(message.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn import(value: Value) -> ImportStatusBody {
        serde_json::from_value(value).expect("import body should parse")
    }

    fn locale(name: &str, steps: &[JobStatus]) -> LocaleBuildStatus {
        LocaleBuildStatus {
            locale: name.to_string(),
            request_status: None,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, status)| BuildStep {
                    name: format!("STEP_{}", i),
                    status: *status,
                })
                .collect(),
        }
    }

    fn succeeded_with(resources: Value) -> ImportStatusBody {
        import(json!({
            "status": "SUCCEEDED",
            "skill": { "skillId": "amzn1.ask.skill.X", "resources": resources }
        }))
    }

    #[test]
    fn test_in_progress_import_never_needs_build_status() {
        let body = import(json!({
            "status": "IN_PROGRESS",
            "skill": { "skillId": "amzn1.ask.skill.X",
                       "resources": [{ "name": "InteractionModel.en-US" }] }
        }));
        assert!(!needs_build_status(&body, PackageType::Advanced));

        let outcome = correlate(&body, PackageType::Advanced, None);
        assert!(!outcome.done);
        assert_eq!(outcome.phase, CorrelationPhase::PollingImport);
    }

    #[test]
    fn test_zero_resources_short_circuits() {
        let body = succeeded_with(json!([]));
        assert!(!needs_build_status(&body, PackageType::Advanced));

        let outcome = correlate(&body, PackageType::Advanced, None);
        assert!(outcome.done);
        assert!(outcome.succeeded);
        assert_eq!(outcome.phase, CorrelationPhase::Done);
    }

    #[test]
    fn test_missing_skill_id_keeps_polling_import() {
        let body = import(json!({
            "status": "SUCCEEDED",
            "skill": { "skillId": "", "resources": [{ "name": "InteractionModel.en-US" }] }
        }));
        assert!(!needs_build_status(&body, PackageType::Advanced));

        let outcome = correlate(&body, PackageType::Standard, None);
        assert!(!outcome.done);
        assert_eq!(outcome.phase, CorrelationPhase::PollingImport);
    }

    #[test]
    fn test_pending_locale_is_not_done() {
        let body = succeeded_with(json!([{ "name": "InteractionModel.en-US", "status": "SUCCEEDED" }]));
        assert!(needs_build_status(&body, PackageType::Advanced));

        let builds = vec![locale("en-US", &[JobStatus::Succeeded, JobStatus::InProgress])];
        let outcome = correlate(&body, PackageType::Advanced, Some(&builds));
        assert!(!outcome.done);
        assert_eq!(outcome.phase, CorrelationPhase::PollingBuild);

        let builds = vec![locale("en-US", &[JobStatus::Succeeded, JobStatus::Succeeded])];
        let outcome = correlate(&body, PackageType::Advanced, Some(&builds));
        assert!(outcome.done);
        assert!(outcome.succeeded);
    }

    #[test]
    fn test_locale_missing_from_build_resource_is_pending() {
        let body = succeeded_with(json!([
            { "name": "InteractionModel.en-US" },
            { "name": "InteractionModel.de-DE" }
        ]));
        let builds = vec![locale("en-US", &[JobStatus::Succeeded])];
        let outcome = correlate(&body, PackageType::Advanced, Some(&builds));
        assert!(!outcome.done);
    }

    #[test]
    fn test_partial_failure_reports_failing_locale() {
        let body = succeeded_with(json!([
            { "name": "InteractionModel.en-US" },
            { "name": "InteractionModel.de-DE" }
        ]));
        let builds = vec![
            locale("de-DE", &[JobStatus::Failed, JobStatus::Failed]),
            locale("en-US", &[JobStatus::Succeeded, JobStatus::Succeeded]),
        ];

        let outcome = correlate(&body, PackageType::Advanced, Some(&builds));
        assert!(outcome.done);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failing_locales, vec!["de-DE"]);
        assert_eq!(outcome.phase, CorrelationPhase::DoneWithFailures);
    }

    #[test]
    fn test_standard_package_ignores_build_details() {
        let body = succeeded_with(json!([{ "name": "InteractionModel.en-US" }]));
        assert!(!needs_build_status(&body, PackageType::Standard));
        let outcome = correlate(&body, PackageType::Standard, None);
        assert!(outcome.done && outcome.succeeded);
    }

    #[test]
    fn test_failed_import_without_skill_id_is_final() {
        let body = import(json!({
            "status": "FAILED",
            "skill": { "resources": [{ "name": "InteractionModel.en-US", "status": "FAILED" }] }
        }));
        let outcome = correlate(&body, PackageType::Advanced, None);
        assert!(outcome.done);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failing_locales, vec!["en-US"]);
    }

    #[test]
    fn test_failed_import_is_final_while_locale_still_builds() {
        let body = import(json!({
            "status": "FAILED",
            "skill": { "skillId": "amzn1.ask.skill.X",
                       "resources": [{ "name": "InteractionModel.en-US" },
                                     { "name": "InteractionModel.de-DE" }] }
        }));
        let builds = vec![
            locale("de-DE", &[JobStatus::Failed]),
            locale("en-US", &[JobStatus::Succeeded, JobStatus::InProgress]),
        ];

        let outcome = correlate(&body, PackageType::Advanced, Some(&builds));
        assert!(outcome.done);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.failing_locales, vec!["de-DE"]);
        assert_eq!(outcome.phase, CorrelationPhase::DoneWithFailures);
    }

    #[test]
    fn test_request_status_in_progress_blocks_completion() {
        let build = LocaleBuildStatus {
            locale: "en-US".to_string(),
            request_status: Some(JobStatus::InProgress),
            steps: Vec::new(),
        };
        assert!(!build.is_complete());
    }
}
