//! CLI commands for keiba-integrator.
//!
//! Single-race integration, date batches, trainer index maintenance and the
//! read-only API server.

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::fragments::{FragmentSource, JsonFragmentStore, ScheduleContext};
use crate::history::{AccumulatedHorseStore, HistorySource, NoHistory};
use crate::integrator::{summary_line, RaceIntegrator};
use crate::race_id::RaceId;
use crate::storage::IntegratedStore;
use crate::trainer::builder::{rebuild_from_disk, BuildInputs};
use crate::trainer::TrainerIndex;
use crate::types::BatchSummary;

#[derive(Parser)]
#[command(name = "keiba-integrator")]
#[command(version, about = "Merge per-race scrape fragments into integrated race files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Integrate one race and merge it into its output file
    Integrate {
        /// 12-digit race id (YYYYMMDD + venue code + race number)
        #[arg(value_name = "RACE_ID")]
        race_id: String,
    },

    /// Integrate every race in a day's schedule
    Batch {
        /// Date as YYYYMMDD
        #[arg(value_name = "DATE")]
        date: String,

        /// Races integrated at once (defaults to batch.concurrency)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Rebuild the trainer index from the CSV table, manual mappings and recent races
    BuildIndex {
        /// Print the result without writing the index file
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the persisted trainer index
    IndexInfo,

    /// Start the read-only API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Wire the integrator from configuration
fn build_integrator(config: &AppConfig) -> RaceIntegrator {
    let fragments: Arc<dyn FragmentSource> = Arc::new(JsonFragmentStore::new(config.paths.json_dir.clone()));

    let trainer_index = match TrainerIndex::load(&config.paths.trainer_index_path) {
        Ok(index) if index.is_empty() => None,
        Ok(index) => {
            tracing::info!("Trainer index loaded: {} entries", index.len());
            Some(Arc::new(index))
        }
        Err(e) => {
            tracing::warn!("Trainer index unavailable, continuing without it: {:#}", e);
            None
        }
    };

    let history: Arc<dyn HistorySource> = match &config.paths.accumulated_dir {
        Some(dir) => Arc::new(AccumulatedHorseStore::new(dir.clone())),
        None => Arc::new(NoHistory),
    };

    RaceIntegrator::new(
        fragments,
        trainer_index,
        history,
        IntegratedStore::new(&config.paths.data_root),
    )
}

/// Integrate a single race.
pub async fn run_integrate(race_id: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let race_id: RaceId = race_id.parse()?;
    let schedule = ScheduleContext::load_optional(&config.paths.data_root, race_id.date_str());
    let entry = schedule.as_ref().and_then(|s| s.entry(&race_id)).cloned();

    let integrator = build_integrator(&config);
    let (record, path) = tokio::task::spawn_blocking(move || {
        integrator.integrate_and_save(&race_id, entry.as_ref())
    })
    .await??;

    println!("{}", summary_line(&record));
    println!("Saved: {}", path.display());
    Ok(())
}

fn print_batch_summary(summary: &BatchSummary) {
    println!("=== Batch Summary {} ===", summary.date);
    println!("  Total:   {}", summary.total_races);
    println!("  Success: {}", summary.success_count);
    println!("  Failed:  {}", summary.failed_count);
    println!("  Rate:    {:.1}%", summary.success_rate);
}

/// Integrate every race scheduled on `date`.
pub async fn run_batch(date: String, concurrency: Option<usize>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let schedule = ScheduleContext::load(&config.paths.data_root, &date)?;
    let concurrency = concurrency.unwrap_or(config.batch.concurrency);

    eprintln!("Found {} races for {}", schedule.entries.len(), date);

    let integrator = Arc::new(build_integrator(&config));
    let summary = integrator.integrate_date(schedule, concurrency).await;

    print_batch_summary(&summary);
    Ok(())
}

/// Rebuild the trainer index.
pub async fn run_build_index(dry_run: bool) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let inputs = BuildInputs {
        trainer_csv: config.paths.trainer_csv_path.clone(),
        manual_mappings: config.paths.manual_mapping_path.clone(),
        existing_index: config.paths.trainer_index_path.clone(),
        races_dir: IntegratedStore::new(&config.paths.data_root).races_dir().to_path_buf(),
        observed_file_limit: config.index.observed_file_limit,
    };

    let (index, stats) = tokio::task::spawn_blocking(move || rebuild_from_disk(&inputs)).await??;

    println!("=== Trainer Index ===");
    println!("  Entries:            {}", index.len());
    println!("  Manual:             {}", stats.manual);
    println!("  Existing kept:      {}", stats.existing);
    println!("  Observed added:     {}", stats.observed_added);
    println!("  Observed unmatched: {}", stats.observed_unmatched);
    println!("  Comments from CSV:  {}", stats.comments_from_csv);

    if dry_run {
        println!("Dry run, index not written");
        return Ok(());
    }

    index.save(&config.paths.trainer_index_path)?;
    println!("Saved: {}", config.paths.trainer_index_path.display());
    Ok(())
}

/// Print the persisted trainer index.
pub fn run_index_info() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let index = TrainerIndex::load(&config.paths.trainer_index_path)?;

    println!("Trainer index: {}", config.paths.trainer_index_path.display());
    println!("Entries: {}", index.len());
    let with_comment = index.entries().values().filter(|e| e.has_comment()).count();
    println!("With comment: {}", with_comment);
    println!();

    for (local_id, entry) in index.entries() {
        println!(
            "  {:<8} {} {:<12} {} ({} chars)",
            local_id,
            entry.official_code,
            entry.name,
            entry.affiliation,
            entry.comment_len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_with_concurrency() {
        let cli = Cli::parse_from(["keiba-integrator", "batch", "20250504", "--concurrency", "8"]);
        match cli.command {
            Commands::Batch { date, concurrency } => {
                assert_eq!(date, "20250504");
                assert_eq!(concurrency, Some(8));
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_parse_build_index_dry_run() {
        let cli = Cli::parse_from(["keiba-integrator", "build-index", "--dry-run"]);
        assert!(matches!(cli.command, Commands::BuildIndex { dry_run: true }));
    }

    #[test]
    fn test_parse_serve_defaults_to_config() {
        let cli = Cli::parse_from(["keiba-integrator", "serve"]);
        assert!(matches!(cli.command, Commands::Serve { host: None, port: None }));
    }
}
