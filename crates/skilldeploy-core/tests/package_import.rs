mod support;

use std::time::Duration;

use serde_json::json;

use skilldeploy_core::error::DeployError;
use skilldeploy_core::import::{ImportPolicies, PackageImporter};
use skilldeploy_core::poll::{Cancellation, RetryPolicy};
use skilldeploy_core::smapi::{HttpMethod, JobStatus, SmapiClient};
use skilldeploy_core::types::PackageType;

use support::{
    FakeTransport, accepted, fast_policies, import_in_progress, import_status, ok,
};

const STATUS_PATH: &str = "/v1/skills/imports/imp-1";

fn new_skill_transport() -> FakeTransport {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "/v1/skills/imports",
        accepted("/v1/skills/imports/imp-1"),
    );
    transport
}

#[tokio::test]
async fn standard_import_polls_until_succeeded() {
    let transport = new_skill_transport();
    transport.on(HttpMethod::Get, STATUS_PATH, ok(import_in_progress()));
    transport.on(HttpMethod::Get, STATUS_PATH, ok(import_in_progress()));
    transport.on(
        HttpMethod::Get,
        STATUS_PATH,
        ok(import_status("SUCCEEDED", Some("amzn1.ask.skill.X"), &["en-US"])),
    );
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let outcome = importer
        .submit_and_await("https://uploads/x", "M1", None, PackageType::Standard)
        .await
        .unwrap();

    assert_eq!(outcome.skill_id, "amzn1.ask.skill.X");
    assert_eq!(outcome.job.job_id, "imp-1");
    assert_eq!(outcome.job.status, JobStatus::Succeeded);
    assert!(outcome.job.terminal_body.is_some());
    assert_eq!(transport.count(HttpMethod::Get, STATUS_PATH), 3);

    let submit = &transport.calls()[0];
    assert_eq!(
        submit.body,
        Some(json!({ "vendorId": "M1", "location": "https://uploads/x" }))
    );
}

#[tokio::test]
async fn existing_skill_imports_into_skill_path() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "/v1/skills/amzn1.ask.skill.X/imports",
        accepted("https://api.example.com/v1/skills/imports/imp-1/"),
    );
    transport.on(
        HttpMethod::Get,
        STATUS_PATH,
        ok(import_status("SUCCEEDED", Some("amzn1.ask.skill.X"), &[])),
    );
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let outcome = importer
        .submit_and_await(
            "https://uploads/x",
            "M1",
            Some("amzn1.ask.skill.X"),
            PackageType::Standard,
        )
        .await
        .unwrap();

    assert_eq!(outcome.job.job_id, "imp-1");
    assert_eq!(
        transport.calls()[0].body,
        Some(json!({ "location": "https://uploads/x" }))
    );
}

#[tokio::test]
async fn rejected_submission_is_fatal_and_verbatim() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "/v1/skills/imports",
        support::not_found(),
    );
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let err = importer.submit("https://uploads/x", "M1", None).await.unwrap_err();

    match err {
        DeployError::Service { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, r#"{"message":"Not found"}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn failed_job_reports_body_without_retrying() {
    let transport = new_skill_transport();
    transport.on(
        HttpMethod::Get,
        STATUS_PATH,
        ok(json!({
            "status": "FAILED",
            "errors": [{ "message": "Invalid manifest" }],
        })),
    );
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let err = importer
        .submit_and_await("https://uploads/x", "M1", None, PackageType::Standard)
        .await
        .unwrap_err();

    assert!(err.is_terminal_outcome());
    assert!(err.to_string().contains("Invalid manifest"), "{err}");
    assert_eq!(transport.count(HttpMethod::Get, STATUS_PATH), 1);
}

#[tokio::test]
async fn service_error_while_polling_is_fatal() {
    let transport = new_skill_transport();
    transport.on(HttpMethod::Get, STATUS_PATH, ok(import_in_progress()));
    transport.on(
        HttpMethod::Get,
        STATUS_PATH,
        skilldeploy_core::smapi::ApiResponse::new(503, json!({ "message": "busy" })),
    );
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let err = importer
        .submit_and_await("https://uploads/x", "M1", None, PackageType::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Service { status: 503, .. }));
    assert_eq!(transport.count(HttpMethod::Get, STATUS_PATH), 2);
}

#[tokio::test]
async fn never_terminal_job_exhausts_attempts() {
    let transport = new_skill_transport();
    transport.on(HttpMethod::Get, STATUS_PATH, ok(import_in_progress()));
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none();
    let policies = ImportPolicies {
        import: RetryPolicy::new(1, 1.0, 3),
        build: RetryPolicy::new(1, 1.0, 3),
    };
    let importer = PackageImporter::new(&client, policies, &cancellation);

    let err = importer
        .submit_and_await("https://uploads/x", "M1", None, PackageType::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::PollExhausted { attempts: 3 }));
    assert!(err.is_abandoned());
    assert_eq!(transport.count(HttpMethod::Get, STATUS_PATH), 3);
}

#[tokio::test]
async fn cancelled_import_makes_no_calls() {
    let transport = new_skill_transport();
    let client = SmapiClient::new(transport.clone());
    let (handle, cancellation) = Cancellation::new();
    handle.cancel();
    let importer = PackageImporter::new(&client, fast_policies(), &cancellation);

    let err = importer.submit("https://uploads/x", "M1", None).await.unwrap_err();

    assert!(matches!(err, DeployError::Cancelled));
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_a_slow_poll() {
    let transport = new_skill_transport();
    transport.on(HttpMethod::Get, STATUS_PATH, ok(import_in_progress()));
    let client = SmapiClient::new(transport.clone());
    let cancellation = Cancellation::none().with_timeout(Duration::from_secs(5));
    let policies = ImportPolicies {
        import: RetryPolicy::new(2_000, 1.0, 50),
        build: RetryPolicy::build_status(),
    };
    let importer = PackageImporter::new(&client, policies, &cancellation);

    let err = importer
        .submit_and_await("https://uploads/x", "M1", None, PackageType::Standard)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::DeadlineExceeded));
    // Attempts at t=0s, 2s and 4s; the deadline fires during the next wait.
    assert_eq!(transport.count(HttpMethod::Get, STATUS_PATH), 3);
}
