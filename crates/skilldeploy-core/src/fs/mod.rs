//! Filesystem primitives shared across features.

pub mod package_zip;
pub mod tree_hash;
pub mod walk;

pub use package_zip::{extract_package, zip_package};
pub use tree_hash::hash_tree;
