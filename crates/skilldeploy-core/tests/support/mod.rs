#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use skilldeploy_core::error::DeployError;
use skilldeploy_core::import::ImportPolicies;
use skilldeploy_core::poll::RetryPolicy;
use skilldeploy_core::smapi::{ApiRequest, ApiResponse, HttpMethod, SmapiTransport};

pub const UPLOAD_URL: &str = "https://uploads.example.com/pkg-1";

/// Polling fast enough that tests don't need paused time.
pub fn fast_policies() -> ImportPolicies {
    ImportPolicies {
        import: RetryPolicy::new(1, 1.0, 10),
        build: RetryPolicy::new(1, 1.0, 10),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct Route {
    queue: VecDeque<ApiResponse>,
    last: Option<ApiResponse>,
}

#[derive(Debug, Default)]
struct FakeState {
    routes: HashMap<(HttpMethod, String), Route>,
    calls: Vec<RecordedCall>,
    uploads: Vec<(String, usize)>,
    downloads: HashMap<String, Vec<u8>>,
}

/// In-memory transport answering scripted responses per (method, path).
///
/// Responses for a route are served in order; the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: HttpMethod, path: &str, response: ApiResponse) -> &Self {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .queue
            .push_back(response);
        self
    }

    pub fn with_download(&self, url: &str, bytes: Vec<u8>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .downloads
            .insert(url.to_string(), bytes);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Script the upload-url, import submission and import status routes.
    pub fn script_import(&self, import_path: &str, import_id: &str, statuses: Vec<Value>) {
        self.on(
            HttpMethod::Post,
            "/v1/skills/uploads",
            ok(json!({ "uploadUrl": UPLOAD_URL })),
        );
        self.on(
            HttpMethod::Post,
            import_path,
            accepted(&format!("/v1/skills/imports/{}", import_id)),
        );
        for status in statuses {
            self.on(
                HttpMethod::Get,
                &format!("/v1/skills/imports/{}", import_id),
                ok(status),
            );
        }
    }
}

impl SmapiTransport for FakeTransport {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, DeployError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
        });
        let route = state
            .routes
            .get_mut(&(request.method, request.path.clone()))
            .ok_or_else(|| {
                DeployError::Transport(format!(
                    "unexpected request {} {}",
                    request.method, request.path
                ))
            })?;
        let response = match route.queue.pop_front() {
            Some(response) => {
                route.last = Some(response.clone());
                response
            }
            None => route.last.clone().ok_or_else(|| {
                DeployError::Transport(format!("no response for {}", request.path))
            })?,
        };
        Ok(response)
    }

    async fn upload(&self, url: &str, bytes: Vec<u8>) -> Result<(), DeployError> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push((url.to_string(), bytes.len()));
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError> {
        self.state
            .lock()
            .unwrap()
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| DeployError::Transport(format!("nothing to download at {}", url)))
    }
}

pub fn ok(body: Value) -> ApiResponse {
    ApiResponse::new(200, body)
}

pub fn accepted(location: &str) -> ApiResponse {
    ApiResponse::new(202, Value::Null).with_header("Location", location)
}

pub fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({ "message": "Not found" }))
}

pub fn import_in_progress() -> Value {
    json!({ "status": "IN_PROGRESS" })
}

/// Import status body; `locales` become `InteractionModel.<locale>` resources.
pub fn import_status(status: &str, skill_id: Option<&str>, locales: &[&str]) -> Value {
    let resources: Vec<Value> = locales
        .iter()
        .map(|l| json!({ "name": format!("InteractionModel.{}", l), "status": status }))
        .collect();
    match skill_id {
        Some(id) => json!({
            "status": status,
            "skill": { "skillId": id, "resources": resources },
        }),
        None => json!({ "status": status }),
    }
}

/// Build status body with one step list per locale.
pub fn build_status(locales: Vec<(&str, Vec<(&str, &str)>)>) -> Value {
    let mut model = serde_json::Map::new();
    for (locale, steps) in locales {
        let steps: Vec<Value> = steps
            .into_iter()
            .map(|(name, status)| json!({ "name": name, "status": status }))
            .collect();
        let request_status = if steps.iter().any(|s| s["status"] == "IN_PROGRESS") {
            "IN_PROGRESS"
        } else if steps.iter().any(|s| s["status"] == "FAILED") {
            "FAILED"
        } else {
            "SUCCEEDED"
        };
        model.insert(
            locale.to_string(),
            json!({
                "lastUpdateRequest": {
                    "status": request_status,
                    "buildDetails": { "steps": steps },
                }
            }),
        );
    }
    json!({ "interactionModel": model })
}

/// Writes a minimal skill package under `root/skill-package`.
pub fn write_skill_package(root: &Path) {
    let package = root.join("skill-package");
    std::fs::create_dir_all(package.join("interactionModels/custom")).unwrap();
    std::fs::write(
        package.join("skill.json"),
        r#"{"manifest":{"publishingInformation":{}}}"#,
    )
    .unwrap();
    std::fs::write(
        package.join("interactionModels/custom/en-US.json"),
        r#"{"interactionModel":{"languageModel":{"invocationName":"demo"}}}"#,
    )
    .unwrap();
}
