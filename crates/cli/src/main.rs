mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cohort_compute::CohortPipeline;
use cohort_core::config::load_dotenv;
use cohort_core::Config;
use cohort_ingest::ParquetImporter;

use crate::cli::{CliArgs, OutputFormat};

/// Rejected rows listed individually before summarizing.
const MAX_LOGGED_REJECTS: usize = 10;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = match args.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    args.apply(&mut config);
    config.log_summary();

    let input = args.input_path(&config);
    let imported = if input.is_dir() {
        ParquetImporter::import_dir(&input, &config.ingest.columns)
    } else {
        ParquetImporter::import(&input, &config.ingest.columns)
    }
    .with_context(|| format!("failed to import transactions from {}", input.display()))?;

    let mut pipeline =
        CohortPipeline::new(config.pipeline.clone()).context("failed to create pipeline")?;
    let mut output = pipeline.run_raw(&imported.rows);

    // Import rejects come first in source order; parser rejects refer to
    // positions within the imported rows.
    let mut rejected = imported.rejected;
    rejected.append(&mut output.rejected);
    for reject in rejected.iter().take(MAX_LOGGED_REJECTS) {
        warn!("rejected {}", reject);
    }
    if rejected.len() > MAX_LOGGED_REJECTS {
        warn!(
            "{} more rejected rows not shown",
            rejected.len() - MAX_LOGGED_REJECTS
        );
    }

    let metrics = pipeline.metrics();
    info!(
        customers = metrics.customers,
        cohorts = metrics.cohorts,
        acceptance = ?metrics.acceptance_rate(),
        "pipeline finished"
    );

    let tables: Vec<_> = args
        .report
        .kinds()
        .into_iter()
        .map(|kind| output.report.render(kind, &config.report))
        .collect();

    match args.format {
        OutputFormat::Text => {
            for table in &tables {
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "tables": tables,
                "rejected": rejected,
                "metrics": metrics,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("failed to serialize report")?
            );
        }
    }

    Ok(())
}
