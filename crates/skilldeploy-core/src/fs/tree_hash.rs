//! Deterministic content fingerprint of a package directory.
//!
//! The fingerprint decides whether a deploy is a no-op, so it must only
//! depend on relative paths and file bytes, never on traversal order,
//! timestamps or permissions.

use std::fs;
use std::path::Path;

use anyhow::Context;

use super::walk::{PackageEntry, list_package};

/// Compute the fingerprint of a package directory.
///
/// # Algorithm
/// - Entries are listed recursively and sorted by relative path
/// - Directory: `rel_path || 0xFF`
/// - File: `rel_path || 0x00 || len(content) as u64 LE || content`
/// - Output: blake3 hex string (64 chars)
///
/// # Example
/// ```no_run
/// use skilldeploy_core::fs::tree_hash::hash_tree;
/// use std::path::Path;
///
/// let hash = hash_tree(Path::new("skill-package"))?;
/// assert_eq!(hash.len(), 64);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn hash_tree(path: &Path) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();

    for entry in list_package(path)? {
        match entry {
            PackageEntry::Dir { rel_path } => {
                hasher.update(rel_path.as_bytes());
                hasher.update(&[0xFF]);
            }
            PackageEntry::File { rel_path, path } => {
                let content = fs::read(&path)
                    .with_context(|| format!("Failed to read file: {}", path.display()))?;
                hasher.update(rel_path.as_bytes());
                hasher.update(&[0x00]);
                // Length prefix keeps "a" + "bc" distinct from "ab" + "c".
                hasher.update(&(content.len() as u64).to_le_bytes());
                hasher.update(&content);
            }
        }
    }

    Ok(hasher.finalize().to_hex().to_string())
}
