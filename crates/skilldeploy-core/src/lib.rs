//! skilldeploy core library
//!
//! Deploys a skill package to the remote skill management service: hash-gated
//! package import, import and per-locale build status correlation, and the
//! staged deploy pipeline with persisted per-profile state.

pub mod commands;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod fs;
pub mod import;
pub mod poll;
pub mod smapi;
pub mod state;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, ProfileConfig, ProjectConfig};
    pub use crate::context::{AppContext, DEFAULT_PROFILE};

    // Deploy
    pub use crate::deploy::{
        DeployOptions, DeployReport, DeploymentOrchestrator, HashGate, MetadataOutcome,
        StageStatus,
    };
    pub use crate::error::DeployError;

    // Polling
    pub use crate::poll::{CancelHandle, Cancellation, RetryPolicy, retry};

    // Remote API
    pub use crate::smapi::{HttpTransport, SmapiClient, SmapiTransport};

    // State
    pub use crate::state::{DeployState, DeployStateStore};

    pub use crate::types::{DeployStage, DeploymentTarget, PackageType, SkillStage};
}
