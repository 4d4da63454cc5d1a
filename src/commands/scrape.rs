use anyhow::{Context, Result};
use colored::Colorize;
use pricing_service::{
    config::{self, Config},
    pricing::{read_snapshot, write_snapshot},
    server,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Execute the scrape command
///
/// Runs one aggregation without the server and writes the merged mapping.
/// Collector failures are reported; a failed write is an error, and so is
/// an empty result when the output file already holds records.
pub async fn execute(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    scrape(&cfg, output).await
}

async fn scrape(cfg: &Config, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| cfg.cache.data_path.clone());

    println!("{}", "Collecting pricing data...".yellow());
    let aggregator = server::build_aggregator(cfg)?;
    let aggregation = aggregator.run().await;

    println!();
    println!("{}", "Collectors:".bold());
    for summary in &aggregation.collectors {
        match &summary.error {
            None => println!(
                "  {} {}: {} records",
                "✓".green(),
                summary.collector,
                summary.records
            ),
            Some(error) => println!("  {} {}: {}", "✗".red(), summary.collector, error),
        }
    }
    println!();

    if aggregation.records.is_empty() {
        let existing = existing_record_count(&output);
        if existing > 0 {
            println!(
                "{}",
                format!(
                    "⚠ No records collected; keeping the {} records in {}",
                    existing,
                    output.display()
                )
                .yellow()
            );
            warn!(
                "Scrape produced no records, {} left untouched",
                output.display()
            );
            anyhow::bail!(
                "All collectors returned nothing; refusing to overwrite {}",
                output.display()
            );
        }
    }

    write_snapshot(&output, &aggregation.records)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{}",
        format!(
            "✓ Wrote {} records to {}",
            aggregation.records.len(),
            output.display()
        )
        .green()
    );
    info!(
        "Scrape finished: {} records, {} collectors failed",
        aggregation.records.len(),
        aggregation.failed_collectors()
    );

    Ok(())
}

/// Records already persisted at `path`; an unreadable file counts as none
fn existing_record_count(path: &Path) -> usize {
    match read_snapshot(path) {
        Ok(snapshot) => snapshot.map_or(0, |s| s.records().len()),
        Err(e) => {
            warn!("Existing pricing file is unreadable: {}", e);
            0
        }
    }
}
