//! Release Publisher CLI
//!
//! Builds, checks and publishes a NuGet package, promoting staging builds

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use release_publisher::build::locate_artifact;
use release_publisher::orchestration::{BuildPipeline, PublishOptions, ReleasePublisher};
use release_publisher::package::{extract_identity, strip_suffix};
use release_publisher::registry::NuGetRegistry;
use release_publisher::{
    CliOverrides, ConfigLoadOptions, ConfigLoader, PublishConfig, PublishError, PublishOutcome,
    SkipReason,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// NuGet release publisher
#[derive(Parser)]
#[command(name = "release-publisher")]
#[command(version)]
#[command(about = "Build, check and publish NuGet packages, promoting staging builds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (unless --artifact is given) and publish the package
    Publish {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        /// Publish this package instead of building one
        #[arg(short, long)]
        artifact: Option<PathBuf>,

        /// Reuse the existing checkout and dependency directories
        #[arg(long)]
        no_download: bool,

        /// Registry service index URL
        #[arg(short, long)]
        registry: Option<String>,

        /// Configuration file (defaults to PROJECT_PATH/.release-publisher.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Version suffix marking staging packages
        #[arg(long)]
        staging_suffix: Option<String>,

        /// Perform every step except the push
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a package's version is already published
    Check {
        /// Package file
        artifact: PathBuf,

        /// Registry service index URL
        #[arg(short, long)]
        registry: Option<String>,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the release version of a staging package next to it
    Promote {
        /// Package file
        artifact: PathBuf,
    },

    /// Print the identity of a package
    Inspect {
        /// Package file
        artifact: PathBuf,
    },

    /// Locate the built package without publishing
    Locate {
        /// Directory holding the build output
        dir: PathBuf,

        /// Substring the package file name must contain
        #[arg(long, default_value = "")]
        name_contains: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            project_path,
            artifact,
            no_download,
            registry,
            config,
            staging_suffix,
            dry_run,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            let overrides = CliOverrides {
                registry_url: registry,
                staging_suffix,
                dry_run,
            };
            publish_command(path, artifact, no_download, config, overrides).await
        }
        Commands::Check {
            artifact,
            registry,
            config,
        } => {
            let overrides = CliOverrides {
                registry_url: registry,
                ..CliOverrides::default()
            };
            check_command(artifact, config, overrides).await
        }
        Commands::Promote { artifact } => promote_command(&artifact),
        Commands::Inspect { artifact } => inspect_command(&artifact),
        Commands::Locate { dir, name_contains } => {
            let path = locate_artifact(&dir, &name_contains)?;
            println!("{}", path.display());
            Ok(0)
        }
    }
}

async fn load_config(
    project_path: &Path,
    config_file: Option<PathBuf>,
    cli_args: CliOverrides,
) -> Result<PublishConfig> {
    let mut options = ConfigLoadOptions::for_project(project_path);
    options.config_file = config_file;
    options.cli_args = cli_args;

    ConfigLoader::load(options)
        .await
        .context("failed to load configuration")
}

async fn publish_command(
    project_path: PathBuf,
    artifact: Option<PathBuf>,
    no_download: bool,
    config_file: Option<PathBuf>,
    overrides: CliOverrides,
) -> Result<i32> {
    println!("\n📦 release-publisher\n");

    let config = load_config(&project_path, config_file, overrides).await?;

    let artifact = match artifact {
        Some(path) => path,
        None => {
            let pipeline = match BuildPipeline::from_config(&project_path, &config) {
                Ok(pipeline) => pipeline,
                Err(e) => return Ok(report_failure(&e)),
            };
            match pipeline.run(!no_download).await {
                Ok(path) => path,
                Err(e) => return Ok(report_failure(&e)),
            }
        }
    };

    let registry = match NuGetRegistry::from_env(&config.registry) {
        Ok(registry) => registry,
        Err(e) => return Ok(report_failure(&e)),
    };

    let mut publisher = ReleasePublisher::new(registry, PublishOptions::from(&config.publish));
    let outcome = publisher.run(&artifact).await;

    match &outcome {
        PublishOutcome::Skipped {
            identity,
            reason: SkipReason::Duplicate { existing },
        } => {
            println!("\n⏭️  {} not uploaded: version {} already exists", identity, existing);
        }
        PublishOutcome::Skipped {
            identity,
            reason: SkipReason::DryRun,
        } => {
            println!("\n🔍 Dry-run: {} is ready to upload", identity);
        }
        PublishOutcome::Published { identity, artifact } => {
            println!("\n✅ Published {} ({})", identity, artifact.display());
        }
        PublishOutcome::Failed(e) => {
            report_failure(e);
        }
    }

    Ok(outcome.exit_code())
}

async fn check_command(
    artifact: PathBuf,
    config_file: Option<PathBuf>,
    overrides: CliOverrides,
) -> Result<i32> {
    let config = load_config(Path::new("."), config_file, overrides).await?;

    let identity = match extract_identity(&artifact) {
        Ok(identity) => identity,
        Err(e) => return Ok(report_failure(&e)),
    };
    let registry = NuGetRegistry::new(&config.registry, None)?;

    match registry
        .find_published_collision(identity.id(), identity.version())
        .await
    {
        Ok(Some(existing)) => {
            println!("⏭️  {}: version {} already exists", identity, existing);
            Ok(0)
        }
        Ok(None) => {
            println!("✅ {}: not published yet", identity);
            Ok(0)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

fn promote_command(artifact: &Path) -> Result<i32> {
    let identity = match extract_identity(artifact) {
        Ok(identity) => identity,
        Err(e) => return Ok(report_failure(&e)),
    };

    match strip_suffix(artifact, identity.version()) {
        Ok(path) if path == artifact => {
            println!("ℹ️  {} has no version suffix; nothing to promote", identity);
            Ok(0)
        }
        Ok(path) => {
            println!("✅ {} → {}", identity, path.display());
            Ok(0)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

fn inspect_command(artifact: &Path) -> Result<i32> {
    match extract_identity(artifact) {
        Ok(identity) => {
            println!("id:           {}", identity.id());
            println!("version:      {}", identity.version());
            println!("base version: {}", identity.base_version());
            println!("suffix:       {}", identity.suffix().unwrap_or("-"));
            Ok(0)
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

fn report_failure(error: &PublishError) -> i32 {
    eprintln!("\n❌ {} [{}]", error, error.code());
    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\nSuggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }
    1
}
