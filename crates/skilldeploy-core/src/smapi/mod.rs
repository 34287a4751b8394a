//! Skill management API: transport seam, HTTP implementation and typed client.

pub mod client;
pub mod http;
pub mod model;
pub mod transport;

pub use client::{Enablement, SmapiClient, StatusResponse, job_id_from_location};
pub use http::{EnvTokenProvider, HttpTransport, StaticTokenProvider, TokenProvider};
pub use model::{BuildStatusBody, ImportStatusBody, JobStatus};
pub use transport::{ApiRequest, ApiResponse, HttpMethod, SmapiTransport};
