//! sports-loader: loads a batch of sports documents into PostgreSQL.
//!
//! Reads `<SOURCE_DIR>/{seasons,rosters,odds,events}/*.json`, loads them in one
//! transaction and logs a JSON run summary. Exits non-zero only when the run itself
//! failed (source or database unavailable); bad records are reported, not fatal.

use anyhow::{Context, Result};
use tracing::{error, info};

use sports_loader::sink::Table;
use sports_loader::{Config, JsonDirSource, LoadPlan, MemorySink, PgSink, RunCoordinator, Sink};

#[tokio::main]
async fn main() -> Result<()> {
    // Local development only; containers pass settings through env and secrets.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sports_loader=info".parse()?),
        )
        .init();

    info!("sports-loader v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("invalid configuration")?;
    let source = JsonDirSource::new(&config.source_dir);
    let plan = LoadPlan {
        kinds: config.kinds.clone(),
        filter: config.filter.clone(),
    };
    info!(
        source = %source.root().display(),
        kinds = ?plan.kinds,
        filtered = !plan.filter.is_empty(),
        "loading documents"
    );

    let mut sink: Box<dyn Sink> = if config.dry_run {
        info!("Running in dry-run mode (DRY_RUN=true); nothing will be written");
        Box::new(MemorySink::new())
    } else {
        let sink = PgSink::connect(&config.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        if config.ensure_schema {
            sink.ensure_schema()
                .await
                .context("failed to create schema")?;
        }
        Box::new(sink)
    };

    let outcome = RunCoordinator::new(sink.as_mut()).run(&source, &plan).await;
    match outcome {
        Ok(summary) => {
            info!(
                "Load completed: {} records written, {} skipped, {} failed",
                summary.records_written, summary.records_skipped, summary.records_failed
            );
            if config.dry_run {
                for table in Table::ALL {
                    let rows = sink.count(table).await?;
                    info!(table = %table, rows, "dry-run row count");
                }
            }
            Ok(())
        }
        Err(failed) => {
            error!("Load failed: {}", failed.error);
            Err(failed.into())
        }
    }
}
