//! reqwest-backed transport.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use super::transport::{ApiRequest, ApiResponse, HttpMethod, SmapiTransport};
use crate::error::DeployError;

/// Default API endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.amazonalexa.com";

/// Environment variable read by [`EnvTokenProvider`].
pub const ACCESS_TOKEN_ENV: &str = "SKILLDEPLOY_ACCESS_TOKEN";

/// Supplies a valid bearer credential on demand.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String, DeployError>;
}

/// Reads the token from `SKILLDEPLOY_ACCESS_TOKEN` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvTokenProvider;

impl TokenProvider for EnvTokenProvider {
    fn access_token(&self) -> Result<String, DeployError> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                DeployError::Precondition(format!(
                    "No access token available. Set {} to a valid bearer token",
                    ACCESS_TOKEN_ENV
                ))
            })
    }
}

/// A fixed token, mostly for scripting.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<String, DeployError> {
        Ok(self.0.clone())
    }
}

/// HTTP transport against the real API.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(endpoint: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, DeployError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            DeployError::Precondition(format!("Invalid API endpoint {}: {}", endpoint, e))
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("skilldeploy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeployError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            tokens,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url_for(&self, path: &str) -> Result<Url, DeployError> {
        self.endpoint
            .join(path)
            .map_err(|e| DeployError::Precondition(format!("Invalid request path {}: {}", path, e)))
    }
}

impl SmapiTransport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<ApiResponse, DeployError> {
        let url = self.url_for(&request.path)?;
        let token = self.tokens.access_token()?;

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
            HttpMethod::Put => self.client.put(url.clone()),
        };
        let builder = builder.header(reqwest::header::AUTHORIZATION, token);
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            DeployError::Transport(format!("{} {} failed: {}", request.method, url, e))
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let bytes = response.bytes().await.map_err(|e| {
            DeployError::Transport(format!("Failed to read response body from {}: {}", url, e))
        })?;

        Ok(ApiResponse {
            status,
            body: decode_body(&bytes),
            headers,
        })
    }

    async fn upload(&self, url: &str, bytes: Vec<u8>) -> Result<(), DeployError> {
        let response = self
            .client
            .put(url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| DeployError::Transport(format!("Failed to upload package: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Service { status, body });
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DeployError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            DeployError::Transport(format!("Failed to download package from {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::Service { status, body });
        }

        let bytes = response.bytes().await.map_err(|e| {
            DeployError::Transport(format!("Failed to read response body from {}: {}", url, e))
        })?;
        Ok(bytes.to_vec())
    }
}

/// Empty bodies become `null`; non-JSON bodies are kept as a string.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
