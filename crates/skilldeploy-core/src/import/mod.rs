//! Package import/export jobs and build-status correlation.

pub mod correlator;
pub mod export;
pub mod job;

pub use correlator::{
    BuildStatusCorrelator, CorrelatedOutcome, CorrelationPhase, LocaleBuildStatus, correlate,
    needs_build_status,
};
pub use export::PackageExporter;
pub use job::{ImportJob, ImportOutcome, ImportPolicies, PackageImporter};
