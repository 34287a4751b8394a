//! Sorted recursive listing of a package directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// One entry below the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageEntry {
    Dir { rel_path: String },
    File { rel_path: String, path: PathBuf },
}

impl PackageEntry {
    pub fn rel_path(&self) -> &str {
        match self {
            PackageEntry::Dir { rel_path } | PackageEntry::File { rel_path, .. } => rel_path,
        }
    }
}

/// List every directory and file below `root`, ordered by relative path.
///
/// Relative paths always use `/` so listings compare equal across platforms.
/// Symlinks are rejected rather than followed.
pub fn list_package(root: &Path) -> anyhow::Result<Vec<PackageEntry>> {
    let meta = fs::metadata(root)
        .with_context(|| format!("Failed to stat package directory: {}", root.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Package path is not a directory: {}", root.display());
    }

    let mut entries = Vec::new();
    collect(root, "", &mut entries)?;
    entries.sort_by(|a, b| a.rel_path().cmp(b.rel_path()));
    Ok(entries)
}

fn collect(dir: &Path, base: &str, out: &mut Vec<PackageEntry>) -> anyhow::Result<()> {
    let read = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    for entry in read {
        let entry =
            entry.with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let rel_path = if base.is_empty() {
            name
        } else {
            format!("{}/{}", base, name)
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", entry.path().display()))?;

        if ty.is_dir() {
            collect(&entry.path(), &rel_path, out)?;
            out.push(PackageEntry::Dir { rel_path });
        } else if ty.is_file() {
            out.push(PackageEntry::File {
                rel_path,
                path: entry.path(),
            });
        } else if ty.is_symlink() {
            anyhow::bail!("Symlinks are not supported: {}", entry.path().display());
        } else {
            anyhow::bail!(
                "Unsupported filesystem entry type: {}",
                entry.path().display()
            );
        }
    }

    Ok(())
}
