//! High-level commands for skilldeploy operations.
//!
//! These are the entry points frontends call; each takes an [`AppContext`].
//!
//! [`AppContext`]: crate::context::AppContext

pub mod deploy;
pub mod export;
pub mod status;

pub use deploy::DeployCommand;
pub use export::{ExportCommand, ExportOptions, ExportReport};
pub use status::{StatusCommand, StatusReport};
