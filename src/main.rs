use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use ddi_ssot::adapter::ddi::{DdiAdapter, MemoryDdiClient};
use ddi_ssot::adapter::sot::SotAdapter;
use ddi_ssot::config::{read_config, SyncConfig};
use ddi_ssot::reconciliation::Reconciler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncDirection {
    /// The DDI appliance is the source, the source of truth is written
    DdiToSot,
    /// The source of truth is the source, the DDI appliance is written
    SotToDdi,
}

/// Reconcile IPAM records between a DDI appliance dump and a network source of truth
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// DDI appliance dump (JSON)
    #[arg(long, env = "DDI_SSOT_DDI_DUMP")]
    ddi_dump: PathBuf,

    /// Source-of-truth database (JSON); created if missing
    #[arg(long, env = "DDI_SSOT_SOT_DB")]
    sot_db: PathBuf,

    /// Sync configuration file (JSON)
    #[arg(short, long, env = "DDI_SSOT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SyncDirection::DdiToSot)]
    direction: SyncDirection,

    /// Compute and print the plan without applying it
    #[arg(long)]
    dry_run: bool,

    /// Leave destination-only records in place
    #[arg(long)]
    skip_unmatched_dst: bool,

    /// Print the plan as JSON
    #[arg(long)]
    plan_json: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

async fn load_config(args: &Args) -> Result<SyncConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)
            .await
            .with_context(|| format!("reading config {}", path.display()))?
            .unwrap_or_default(),
        None => SyncConfig::default(),
    };

    if args.dry_run {
        config.dry_run = true;
    }
    if args.skip_unmatched_dst {
        config.skip_unmatched_dst = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args).await?;
    let reconciler = Reconciler::new(config)?;

    let client = Arc::new(
        MemoryDdiClient::from_file(&args.ddi_dump)
            .await
            .with_context(|| format!("reading DDI dump {}", args.ddi_dump.display()))?,
    );
    let ddi = DdiAdapter::new(client.clone(), &reconciler.config().markers());
    let sot = SotAdapter::open(&args.sot_db)
        .await
        .with_context(|| format!("reading source-of-truth database {}", args.sot_db.display()))?;

    let report = match args.direction {
        SyncDirection::DdiToSot => reconciler.run(&ddi, &sot).await?,
        SyncDirection::SotToDdi => reconciler.run(&sot, &ddi).await?,
    };

    if !report.dry_run {
        match args.direction {
            SyncDirection::DdiToSot => {
                sot.save(&args.sot_db).await?;
                info!(path = %args.sot_db.display(), "Saved source-of-truth database");
            }
            SyncDirection::SotToDdi => {
                client.save(&args.ddi_dump).await?;
                info!(path = %args.ddi_dump.display(), "Saved DDI dump");
            }
        }
    }

    if args.plan_json {
        println!("{}", serde_json::to_string_pretty(&report.plan)?);
    }
    println!("{}", report.summary());

    if let Some(result) = &report.result {
        if result.has_failures() {
            bail!("{} change(s) failed to apply", result.failures.len());
        }
    }
    Ok(())
}
