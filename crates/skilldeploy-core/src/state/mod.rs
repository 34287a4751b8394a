//! Persisted per-profile deploy state.

pub mod store;
pub mod types;

pub use store::{DeployStateStore, STATE_DIR_NAME, STATE_FILE_NAME};
pub use types::{
    DeployState, HashRecord, InfrastructureState, ProfileState, STATE_VERSION, StageHash,
};
