//! skilldeploy - skill package deploy tool
//!
//! Usage:
//!   skilldeploy deploy [--target metadata|code|skill-infrastructure] [--ignore-hash]
//!   skilldeploy export [--stage development|live] [--force]
//!   skilldeploy status [--format table|json]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skilldeploy_core::commands::{
    DeployCommand, ExportCommand, ExportOptions, StatusCommand, StatusReport,
};
use skilldeploy_core::context::{AppContext, DEFAULT_PROFILE};
use skilldeploy_core::deploy::{DeployOptions, DeployReport, StageStatus};
use skilldeploy_core::poll::Cancellation;
use skilldeploy_core::smapi::EnvTokenProvider;
use skilldeploy_core::types::{DeploymentTarget, SkillStage};

#[derive(Parser)]
#[command(name = "skilldeploy")]
#[command(about = "Deploy skill packages, code and infrastructure", long_about = None)]
struct Cli {
    /// Project directory containing skilldeploy.toml
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Profile from skilldeploy.toml
    #[arg(short, long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the skill package, code and infrastructure
    Deploy {
        /// Limit the deploy to one stage (default: everything)
        #[arg(short, long, value_parser = parse_target)]
        target: Option<DeploymentTarget>,

        /// Import the skill package even if it has not changed
        #[arg(long)]
        ignore_hash: bool,

        /// Give up after this many seconds (overrides polling.timeout_secs)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Export a skill stage into the profile's package directory
    Export {
        /// Skill stage to export
        #[arg(short, long, default_value = "development", value_parser = parse_stage)]
        stage: SkillStage,

        /// Replace an existing package directory
        #[arg(short, long)]
        force: bool,
    },

    /// Show persisted deploy state
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn parse_target(s: &str) -> Result<DeploymentTarget> {
    s.parse()
}

fn parse_stage(s: &str) -> Result<SkillStage> {
    s.parse()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "skilldeploy=debug,info"
    } else {
        "skilldeploy=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let project_root = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let (handle, cancellation) = Cancellation::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            handle.cancel();
        }
    });

    let context =
        AppContext::load(project_root, cli.profile)?.with_cancellation(cancellation);

    match cli.command {
        Commands::Deploy {
            target,
            ignore_hash,
            timeout,
        } => {
            let context = match timeout {
                Some(secs) => context.with_timeout(Duration::from_secs(secs)),
                None => context,
            };
            run_deploy(context, target.unwrap_or_default(), ignore_hash).await
        }
        Commands::Export { stage, force } => run_export(context, stage, force).await,
        Commands::Status { format } => run_status(context, format),
    }
}

async fn run_deploy(context: AppContext, target: DeploymentTarget, ignore_hash: bool) -> Result<()> {
    let client = context.http_client(Arc::new(EnvTokenProvider))?;
    let options = DeployOptions::new()
        .with_target(target)
        .with_ignore_hash(ignore_hash);

    let report = DeployCommand::new(context).execute(client, &options).await?;
    print_deploy_report(&report);

    match report.failure {
        Some(failure) => anyhow::bail!("{}", failure),
        None => Ok(()),
    }
}

fn print_deploy_report(report: &DeployReport) {
    println!("Profile: {}", report.profile);
    for outcome in &report.stages {
        match &outcome.status {
            StageStatus::Deployed => println!("✓ {} deployed", outcome.stage),
            StageStatus::Skipped { reason } => println!("• {} skipped: {}", outcome.stage, reason),
            StageStatus::Warned { message } => println!("⚠ {}", message),
        }
    }
    if let Some(skill_id) = &report.skill_id {
        println!("Skill ID: {}", skill_id);
    }
    for warning in &report.warnings {
        println!("  ⚠ {}", warning);
    }
}

async fn run_export(context: AppContext, stage: SkillStage, force: bool) -> Result<()> {
    let client = context.http_client(Arc::new(EnvTokenProvider))?;
    let options = ExportOptions::new().with_stage(stage).with_force(force);

    let report = ExportCommand::new(context)
        .execute(&client, &options)
        .await?;
    println!(
        "✓ Exported {} stage of {} into {} ({} files)",
        report.stage.as_str(),
        report.skill_id,
        report.package_dir.display(),
        report.files
    );
    Ok(())
}

fn run_status(context: AppContext, format: OutputFormat) -> Result<()> {
    let report = StatusCommand::new(context).execute()?;
    match format {
        OutputFormat::Table => print_status_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn print_status_table(report: &StatusReport) {
    println!("Profile: {}", report.profile);
    println!("State: {}", report.state_path.display());
    if let Some(updated_at) = report.updated_at {
        println!("Updated: {}", updated_at.to_rfc3339());
    }
    println!();

    if !report.is_deployed() {
        println!("Not deployed yet. Run: skilldeploy deploy");
        return;
    }

    let none = "-".to_string();
    println!("{:<24} {}", "Skill ID", report.skill_id.as_ref().unwrap_or(&none));
    println!(
        "{:<24} {}",
        "Skill metadata hash",
        report.metadata_hash.as_ref().unwrap_or(&none)
    );
    for (region, hash) in &report.code {
        println!(
            "{:<24} {}",
            format!("Code [{}]", region),
            hash.as_ref().unwrap_or(&none)
        );
    }
    if let Some(infra) = &report.infrastructure {
        println!("{:<24} {}", "Infrastructure", infra.kind);
    }
}
