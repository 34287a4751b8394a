//! Content-hash gate for skipping redundant metadata deploys.

use std::path::Path;

use crate::fs::hash_tree;
use crate::state::DeployState;

/// Result of comparing the package on disk with the last deployed hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDecision {
    pub skip: bool,
    pub current_hash: String,
}

/// Compares package content hashes against persisted [`HashRecord`]s.
///
/// Has no side effects; persisting a new hash is up to the caller once the
/// import succeeds.
///
/// [`HashRecord`]: crate::state::HashRecord
#[derive(Debug, Clone, Copy)]
pub struct HashGate<'a> {
    state: &'a DeployState,
}

impl<'a> HashGate<'a> {
    pub fn new(state: &'a DeployState) -> Self {
        Self { state }
    }

    pub fn should_skip(&self, profile: &str, package_path: &Path) -> anyhow::Result<HashDecision> {
        let current_hash = hash_tree(package_path)?;
        let skip = self
            .state
            .hash_record(profile)
            .is_some_and(|record| record.last_deploy_hash == current_hash);
        Ok(HashDecision { skip, current_hash })
    }
}
