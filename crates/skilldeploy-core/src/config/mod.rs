//! Project configuration (skilldeploy.toml).

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_project_toml, parse_project_toml_str};
pub use schema::{
    CodeRegionConfig, InfrastructureConfig, PolicyOverride, PollingConfig, ProfileConfig,
    ProjectConfig,
};
pub use store::ConfigStore;

/// Config file name at the project root.
pub const CONFIG_FILE_NAME: &str = "skilldeploy.toml";
