//! redshift-reconciler: applies a JSON manifest of Redshift resources
//! against the in-memory service simulator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redshift_api::{ArnContext, MemoryRedshift};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redshift_reconciler::{PollConfig, ProviderContext, ReconcilerConfig, ResourceKind};

mod manifest;

use manifest::{Manifest, Provider};

/// Redshift resource reconciler
#[derive(Parser, Debug)]
#[command(name = "redshift-reconciler", version, about)]
struct Cli {
    /// Reconciler configuration (timeouts, poll settings) as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Region used in ARNs
    #[arg(long, global = true, default_value = "us-west-2")]
    region: String,

    /// Account id used in ARNs
    #[arg(long, global = true, default_value = "123456789012")]
    account_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create every resource in the manifest
    Apply {
        /// Path to the manifest
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Create every resource in the manifest, then delete it again
    Destroy {
        /// Path to the manifest
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Apply the manifest, then import one resource by identifier
    Import {
        /// Path to the manifest
        #[arg(long)]
        manifest: PathBuf,

        /// Resource kind, e.g. cluster or snapshot-schedule-association
        #[arg(long)]
        kind: ResourceKind,

        /// Identifier as the service knows it
        raw_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redshift_reconciler=info,redshift_api=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ReconcilerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => simulator_config(),
    };
    let arn = ArnContext::new("aws", cli.region, cli.account_id);
    info!("Using region {} and account {}", arn.region, arn.account_id);

    match cli.command {
        Commands::Apply { manifest } => {
            let manifest = Manifest::from_json_file(&manifest)?;
            let provider = provider(&manifest, arn, config);
            let outcomes = provider.apply(&manifest).await?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Commands::Destroy { manifest } => {
            let manifest = Manifest::from_json_file(&manifest)?;
            let provider = provider(&manifest, arn, config);
            let outcomes = provider.apply(&manifest).await?;
            provider.destroy(&manifest, &outcomes).await?;
            // A second pass finds nothing left and still succeeds.
            provider.destroy(&manifest, &outcomes).await?;
            info!("Destroyed {} resources", outcomes.len());
        }
        Commands::Import {
            manifest,
            kind,
            raw_id,
        } => {
            let manifest = Manifest::from_json_file(&manifest)?;
            let provider = provider(&manifest, arn, config);
            provider.apply(&manifest).await?;
            let outcome = provider.import(kind, &raw_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn provider(manifest: &Manifest, arn: ArnContext, config: ReconcilerConfig) -> Provider {
    let sim = MemoryRedshift::new(arn.clone());
    let ctx = ProviderContext::new(arn, config)
        .with_default_tags(manifest.default_tags.clone())
        .with_ignore_tag_prefixes(manifest.ignore_tag_prefixes.clone());
    Provider::new(sim, ctx)
}

/// Default timeouts with a poll cadence suited to the in-memory service.
fn simulator_config() -> ReconcilerConfig {
    ReconcilerConfig {
        poll: PollConfig {
            delay: Duration::ZERO,
            min_interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(500),
        },
        ..ReconcilerConfig::default()
    }
}
