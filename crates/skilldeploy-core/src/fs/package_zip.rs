//! Zip a package directory for upload and unpack exported packages.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;

use super::walk::{PackageEntry, list_package};

/// Top-level folder some exported archives wrap their contents in.
const EXPORT_ROOT_DIR: &str = "skill-package";

/// Build an in-memory zip of `root` with entries relative to it.
///
/// Entry order and timestamps are fixed, so identical trees produce
/// identical archives.
pub fn zip_package(root: &Path) -> anyhow::Result<Vec<u8>> {
    let entries = list_package(root)?;

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for entry in entries {
            match entry {
                PackageEntry::Dir { rel_path } => {
                    zip.add_directory(format!("{}/", rel_path), options)
                        .with_context(|| format!("Failed to add directory to zip: {}", rel_path))?;
                }
                PackageEntry::File { rel_path, path } => {
                    let content = std::fs::read(&path)
                        .with_context(|| format!("Failed to read file: {}", path.display()))?;
                    zip.start_file(rel_path.as_str(), options)
                        .with_context(|| format!("Failed to add file to zip: {}", rel_path))?;
                    zip.write_all(&content)
                        .with_context(|| format!("Failed to write zip entry: {}", rel_path))?;
                }
            }
        }

        zip.finish().context("Failed to finish package zip")?;
    }

    Ok(buf.into_inner())
}

/// Extract an exported package archive into `dest`.
///
/// A single `skill-package/` wrapper directory is stripped. Entries whose
/// names escape the destination are skipped.
pub fn extract_package(data: &[u8], dest: &Path) -> anyhow::Result<usize> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    let cursor = std::io::Cursor::new(data);
    let mut archive =
        zip::ZipArchive::new(cursor).context("Failed to read package as zip archive")?;

    let wrapped = (0..archive.len()).all(|i| {
        archive
            .name_for_index(i)
            .map(|name| name.starts_with(&format!("{}/", EXPORT_ROOT_DIR)))
            .unwrap_or(false)
    }) && !archive.is_empty();

    let mut written = 0;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        let Some(enclosed) = file.enclosed_name() else {
            continue;
        };
        let relative = if wrapped {
            match enclosed.strip_prefix(EXPORT_ROOT_DIR) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => continue,
            }
        } else {
            enclosed.to_path_buf()
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let outpath = dest.join(&relative);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read zip entry: {}", file.name()))?;
        std::fs::write(&outpath, &buffer)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::tree_hash::hash_tree;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_zip_is_deterministic() {
        let tmp = TempDir::new().expect("tempdir should succeed");
        write_file(&tmp.path().join("skill.json"), "{}");
        write_file(&tmp.path().join("interactionModels/custom/en-US.json"), "{}");

        let first = zip_package(tmp.path()).expect("zip should succeed");
        let second = zip_package(tmp.path()).expect("zip should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_zip_then_extract_preserves_tree_hash() {
        let src = TempDir::new().expect("tempdir should succeed");
        write_file(&src.path().join("skill.json"), "{\"manifest\":{}}");
        write_file(&src.path().join("assets/en-US_largeIcon.png"), "png");

        let bytes = zip_package(src.path()).expect("zip should succeed");
        let dest = TempDir::new().expect("tempdir should succeed");
        let written = extract_package(&bytes, dest.path()).expect("extract should succeed");

        assert_eq!(written, 2);
        assert_eq!(
            hash_tree(src.path()).unwrap(),
            hash_tree(dest.path()).unwrap()
        );
    }

    #[test]
    fn test_extract_strips_wrapper_directory() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.add_directory("skill-package/", options).unwrap();
            zip.start_file("skill-package/skill.json", options).unwrap();
            zip.write_all(b"{}").unwrap();
            zip.finish().unwrap();
        }

        let dest = TempDir::new().expect("tempdir should succeed");
        extract_package(&buf.into_inner(), dest.path()).expect("extract should succeed");
        assert!(dest.path().join("skill.json").exists());
        assert!(!dest.path().join("skill-package").exists());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dest = TempDir::new().expect("tempdir should succeed");
        assert!(extract_package(b"not a zip", dest.path()).is_err());
    }
}
