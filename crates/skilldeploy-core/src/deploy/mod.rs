//! Deploy pipeline: hash gate, stage delegates and the orchestrator.

pub mod delegates;
pub mod hash_gate;
pub mod orchestrator;
pub mod report;

pub use delegates::{
    CodeArtifact, CodeBuildRequest, CodeBuilder, CommandCodeBuilder,
    CommandInfrastructureDeployer, InfrastructureDeployer, InfrastructureRequest,
    InfrastructureResult,
};
pub use hash_gate::{HashDecision, HashGate};
pub use orchestrator::{DeployOptions, DeploymentOrchestrator, MetadataOutcome};
pub use report::{DeployReport, StageFailure, StageOutcome, StageStatus};
