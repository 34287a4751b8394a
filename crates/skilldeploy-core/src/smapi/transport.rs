//! The transport seam: everything the pipeline needs from the network.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use serde_json::Value;

use crate::error::DeployError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        })
    }
}

/// One call against the API. `path` is relative to the API endpoint and
/// may carry a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: None,
        }
    }
}

/// Raw response: status code, decoded body and lower-cased headers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as compact JSON, for error messages shown verbatim.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Network capabilities the pipeline depends on.
///
/// Implementations must fail with [`DeployError::Transport`] only when the
/// call itself failed; any HTTP status, including 4xx/5xx, is returned as an
/// [`ApiResponse`].
pub trait SmapiTransport: Send + Sync {
    /// Authenticated API call.
    fn call(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, DeployError>> + Send;

    /// PUT raw bytes to a pre-signed upload URL.
    fn upload(
        &self,
        url: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), DeployError>> + Send;

    /// GET raw bytes from a pre-signed download URL.
    fn download(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, DeployError>> + Send;
}
