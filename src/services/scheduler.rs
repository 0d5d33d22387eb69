use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::db::{Store, timestamp};
use crate::services::clock::Clock;

/// Background maintenance jobs. Currently only the expired-code sweep.
pub struct Scheduler {
    store: Store,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Registers the jobs and starts the cron scheduler. The returned handle
    /// must be kept alive and shut down on exit.
    pub async fn start(&self) -> Result<Option<JobScheduler>> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(None);
        }

        let sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let clock = Arc::clone(&self.clock);
        let purge_job = Job::new_async(self.config.purge_cron.as_str(), move |_uuid, _lock| {
            let store = store.clone();
            let clock = Arc::clone(&clock);
            Box::pin(async move {
                if let Err(e) = purge_expired_codes(&store, clock.as_ref()).await {
                    error!(event = "job_failed", job_name = "purge_codes", error = %e, "Expired code sweep failed");
                }
            })
        })?;

        sched.add(purge_job).await?;
        sched.start().await?;

        info!("Expired code sweep scheduled: {}", self.config.purge_cron);

        Ok(Some(sched))
    }
}

/// Deletes every verification code that has expired as of now.
pub async fn purge_expired_codes(store: &Store, clock: &dyn Clock) -> Result<u64> {
    let start = std::time::Instant::now();
    let removed = store
        .purge_expired_verification_codes(&timestamp(clock.now()))
        .await?;

    info!(
        event = "job_finished",
        job_name = "purge_codes",
        removed,
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Expired code sweep finished"
    );

    Ok(removed)
}
