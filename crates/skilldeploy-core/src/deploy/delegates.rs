//! Local delegates for the code and infrastructure stages.
//!
//! Both run local processes, so they are synchronous and the orchestrator
//! moves them onto the blocking pool.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::Context;
use serde_json::Value;

use crate::fs::hash_tree;

/// One code region to build.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBuildRequest {
    pub profile: String,
    pub region: String,
    /// Absolute source directory
    pub src: PathBuf,
    pub build: Vec<String>,
}

/// A built region and the content hash of its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeArtifact {
    pub region: String,
    pub hash: String,
}

pub trait CodeBuilder: Send + Sync {
    fn build(&self, request: &CodeBuildRequest) -> anyhow::Result<CodeArtifact>;
}

/// Runs the configured build command inside the region's `src`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCodeBuilder;

impl CodeBuilder for CommandCodeBuilder {
    fn build(&self, request: &CodeBuildRequest) -> anyhow::Result<CodeArtifact> {
        if !request.src.is_dir() {
            anyhow::bail!(
                "Code source for region '{}' not found: {}",
                request.region,
                request.src.display()
            );
        }
        if let Some((program, args)) = request.build.split_first() {
            let mut cmd = Command::new(program);
            cmd.args(args).current_dir(&request.src);
            run(cmd, &request.build)?;
        }
        let hash = hash_tree(&request.src)?;
        Ok(CodeArtifact {
            region: request.region.clone(),
            hash,
        })
    }
}

/// Inputs for the infrastructure deploy.
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureRequest {
    pub profile: String,
    pub skill_id: String,
    pub project_root: PathBuf,
    /// Deployment-type marker
    pub kind: String,
    pub command: Vec<String>,
    /// Code regions and the hash last built for each
    pub regions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureResult {
    pub kind: String,
    pub deploy_state: Value,
}

pub trait InfrastructureDeployer: Send + Sync {
    fn deploy(&self, request: &InfrastructureRequest) -> anyhow::Result<InfrastructureResult>;
}

/// Runs the configured command from the project root.
///
/// The skill id, profile and regions are passed via `SKILL_ID`,
/// `SKILLDEPLOY_PROFILE` and `SKILLDEPLOY_REGIONS`. Stdout becomes the
/// recorded deploy state, parsed as JSON when possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandInfrastructureDeployer;

impl InfrastructureDeployer for CommandInfrastructureDeployer {
    fn deploy(&self, request: &InfrastructureRequest) -> anyhow::Result<InfrastructureResult> {
        let (program, args) = request
            .command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Infrastructure command is empty"))?;

        let regions = request.regions.keys().cloned().collect::<Vec<_>>().join(",");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&request.project_root)
            .env("SKILL_ID", &request.skill_id)
            .env("SKILLDEPLOY_PROFILE", &request.profile)
            .env("SKILLDEPLOY_REGIONS", regions);
        let output = run(cmd, &request.command)?;

        Ok(InfrastructureResult {
            kind: request.kind.clone(),
            deploy_state: parse_deploy_state(&String::from_utf8_lossy(&output.stdout)),
        })
    }
}

fn run(mut cmd: Command, argv: &[String]) -> anyhow::Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to run {:?}", argv))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Command {:?} failed ({}): {}", argv, output.status, stderr.trim());
    }
    Ok(output)
}

fn parse_deploy_state(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
