//! Typed operations over a [`SmapiTransport`].

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use super::model::{BuildStatusBody, ExportStatusBody, ImportStatusBody, UploadUrlBody};
use super::transport::{ApiRequest, ApiResponse, SmapiTransport};
use crate::error::DeployError;
use crate::types::SkillStage;

/// A decoded status body together with the raw JSON it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse<B> {
    pub body: B,
    pub raw: Value,
}

/// Result of asking whether a skill is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enablement {
    Enabled,
    NotEnabled,
}

#[derive(Debug, Clone)]
pub struct SmapiClient<T> {
    transport: T,
}

impl<T: SmapiTransport> SmapiClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Reserve a pre-signed URL to upload a package zip to.
    pub async fn create_upload_url(&self) -> Result<String, DeployError> {
        let response = self
            .transport
            .call(ApiRequest::post("/v1/skills/uploads", json!({})))
            .await?;
        let body: UploadUrlBody = decode(&ensure_success(response)?, "upload url")?;
        Ok(body.upload_url)
    }

    pub async fn upload_package(&self, upload_url: &str, bytes: Vec<u8>) -> Result<(), DeployError> {
        self.transport.upload(upload_url, bytes).await
    }

    /// Submit a package for import. Returns the import job id.
    ///
    /// Without a `skill_id` a new skill is created under `vendor_id`.
    pub async fn import_package(
        &self,
        location: &str,
        vendor_id: &str,
        skill_id: Option<&str>,
    ) -> Result<String, DeployError> {
        let request = match skill_id {
            Some(id) => ApiRequest::post(
                format!("/v1/skills/{}/imports", id),
                json!({ "location": location }),
            ),
            None => ApiRequest::post(
                "/v1/skills/imports",
                json!({ "vendorId": vendor_id, "location": location }),
            ),
        };
        let response = ensure_success(self.transport.call(request).await?)?;
        job_id_from_location(&response)
    }

    pub async fn get_import_status(
        &self,
        import_id: &str,
    ) -> Result<StatusResponse<ImportStatusBody>, DeployError> {
        self.get_status(format!("/v1/skills/imports/{}", import_id), "import status")
            .await
    }

    pub async fn get_build_status(
        &self,
        skill_id: &str,
    ) -> Result<StatusResponse<BuildStatusBody>, DeployError> {
        self.get_status(
            format!("/v1/skills/{}/status?resource=interactionModel", skill_id),
            "build status",
        )
        .await
    }

    /// Request an export of a skill stage. Returns the export job id.
    pub async fn export_package(
        &self,
        skill_id: &str,
        stage: SkillStage,
    ) -> Result<String, DeployError> {
        let request = ApiRequest::post(
            format!("/v1/skills/{}/stages/{}/exports", skill_id, stage.as_str()),
            json!({}),
        );
        let response = ensure_success(self.transport.call(request).await?)?;
        job_id_from_location(&response)
    }

    pub async fn get_export_status(
        &self,
        export_id: &str,
    ) -> Result<StatusResponse<ExportStatusBody>, DeployError> {
        self.get_status(format!("/v1/skills/exports/{}", export_id), "export status")
            .await
    }

    pub async fn get_enablement(
        &self,
        skill_id: &str,
        stage: SkillStage,
    ) -> Result<Enablement, DeployError> {
        let response = self
            .transport
            .call(ApiRequest::get(enablement_path(skill_id, stage)))
            .await?;
        if response.status == 404 {
            return Ok(Enablement::NotEnabled);
        }
        ensure_success(response)?;
        Ok(Enablement::Enabled)
    }

    pub async fn enable_skill(&self, skill_id: &str, stage: SkillStage) -> Result<(), DeployError> {
        let response = self
            .transport
            .call(ApiRequest::put(enablement_path(skill_id, stage)))
            .await?;
        ensure_success(response)?;
        Ok(())
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError> {
        self.transport.download(url).await
    }

    async fn get_status<B: DeserializeOwned>(
        &self,
        path: String,
        what: &str,
    ) -> Result<StatusResponse<B>, DeployError> {
        let response = ensure_success(self.transport.call(ApiRequest::get(path)).await?)?;
        let body = decode(&response, what)?;
        Ok(StatusResponse {
            body,
            raw: response.body,
        })
    }
}

fn enablement_path(skill_id: &str, stage: SkillStage) -> String {
    format!("/v1/skills/{}/stages/{}/enablement", skill_id, stage.as_str())
}

/// Any non-2xx response is fatal and carries the body verbatim.
fn ensure_success(response: ApiResponse) -> Result<ApiResponse, DeployError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(DeployError::Service {
            status: response.status,
            body: response.body_text(),
        })
    }
}

fn decode<B: DeserializeOwned>(response: &ApiResponse, what: &str) -> Result<B, DeployError> {
    serde_json::from_value(response.body.clone()).map_err(|e| {
        DeployError::InvalidResponse(format!(
            "Failed to parse {} response: {} (body: {})",
            what,
            e,
            response.body_text()
        ))
    })
}

/// Job id is the last non-empty path segment of the `Location` header.
pub fn job_id_from_location(response: &ApiResponse) -> Result<String, DeployError> {
    let location = response.header("location").ok_or_else(|| {
        DeployError::InvalidResponse("Response is missing the Location header".to_string())
    })?;

    // Location may be relative; resolve against a dummy base to parse it.
    let base = Url::parse("http://localhost/").map_err(|e| {
        DeployError::InvalidResponse(format!("Failed to build base url: {}", e))
    })?;
    let url = base.join(location).map_err(|e| {
        DeployError::InvalidResponse(format!("Invalid Location header {}: {}", location, e))
    })?;

    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| {
            DeployError::InvalidResponse(format!("No job id in Location header: {}", location))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_from_relative_location() {
        let response = ApiResponse::new(202, Value::Null)
            .with_header("Location", "/v1/skills/imports/amzn1.ask-package.import.42");
        assert_eq!(
            job_id_from_location(&response).unwrap(),
            "amzn1.ask-package.import.42"
        );
    }

    #[test]
    fn test_job_id_from_absolute_location_with_trailing_slash() {
        let response = ApiResponse::new(202, Value::Null).with_header(
            "location",
            "https://api.amazonalexa.com/v1/skills/exports/export-7/",
        );
        assert_eq!(job_id_from_location(&response).unwrap(), "export-7");
    }

    #[test]
    fn test_missing_location_is_invalid_response() {
        let response = ApiResponse::new(202, Value::Null);
        assert!(matches!(
            job_id_from_location(&response),
            Err(DeployError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_non_success_keeps_body_verbatim() {
        let response = ApiResponse::new(403, json!({"message": "Access denied"}));
        match ensure_success(response) {
            Err(DeployError::Service { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, r#"{"message":"Access denied"}"#);
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }
}
