//! Race integration: fragments in, one persisted record out.

pub mod assembler;
pub mod merger;

use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{IntegrateError, Result};
use crate::fragments::{FragmentSet, FragmentSource, ScheduleContext, ScheduleEntry};
use crate::history::HistorySource;
use crate::race_id::RaceId;
use crate::storage::IntegratedStore;
use crate::trainer::TrainerIndex;
use crate::types::{BatchSummary, RaceRecord};

pub use assembler::{assemble_race, summary_line};
pub use merger::HorseMerger;

/// Integrates races against shared, read-only lookups
pub struct RaceIntegrator {
    fragments: Arc<dyn FragmentSource>,
    trainer_index: Option<Arc<TrainerIndex>>,
    history: Arc<dyn HistorySource>,
    store: IntegratedStore,
}

impl RaceIntegrator {
    pub fn new(
        fragments: Arc<dyn FragmentSource>,
        trainer_index: Option<Arc<TrainerIndex>>,
        history: Arc<dyn HistorySource>,
        store: IntegratedStore,
    ) -> Self {
        Self {
            fragments,
            trainer_index,
            history,
            store,
        }
    }

    pub fn store(&self) -> &IntegratedStore {
        &self.store
    }

    /// Assemble one race without persisting it
    pub fn integrate(&self, race_id: &RaceId, schedule: Option<&ScheduleEntry>) -> Result<RaceRecord> {
        let fragments = FragmentSet::load(self.fragments.as_ref(), race_id);
        let merger = HorseMerger::new(self.trainer_index.as_deref(), self.history.as_ref());

        assemble_race(race_id, &fragments, schedule, &merger)
            .ok_or_else(|| IntegrateError::MissingRequiredSource(race_id.to_string()))
    }

    /// Assemble one race and merge it into its integrated file
    pub fn integrate_and_save(
        &self,
        race_id: &RaceId,
        schedule: Option<&ScheduleEntry>,
    ) -> Result<(RaceRecord, PathBuf)> {
        let record = self.integrate(race_id, schedule)?;
        let path = self.store.save(&record)?;
        info!("{} -> {}", summary_line(&record), path.display());
        Ok((record, path))
    }

    /// Integrate every race in a day's schedule, `concurrency` races at a time.
    ///
    /// A failing race is logged and counted; it never stops the batch.
    pub async fn integrate_date(self: Arc<Self>, schedule: ScheduleContext, concurrency: usize) -> BatchSummary {
        let total = schedule.entries.len();
        info!("Integrating {} races for {} ({} workers)", total, schedule.date, concurrency.max(1));

        let outcomes: Vec<bool> = stream::iter(schedule.entries.into_iter())
            .map(|entry| {
                let integrator = Arc::clone(&self);
                async move {
                    let race_id = entry.race_id.clone();
                    let joined = tokio::task::spawn_blocking(move || {
                        integrator.integrate_and_save(&entry.race_id, Some(&entry))
                    })
                    .await;

                    match joined {
                        Ok(Ok(_)) => true,
                        Ok(Err(e)) => {
                            warn!("{}: {}", race_id, e);
                            false
                        }
                        Err(e) => {
                            warn!("{}: worker failed: {}", race_id, e);
                            false
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let success = outcomes.iter().filter(|ok| **ok).count();
        let summary = BatchSummary::new(&schedule.date, total, success);
        info!(
            "Batch {}: {}/{} succeeded ({:.1}%)",
            summary.date, summary.success_count, summary.total_races, summary.success_rate
        );
        summary
    }
}
