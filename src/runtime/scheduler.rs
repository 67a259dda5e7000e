/// Background checkpoint sweeper
///
/// Suspended sessions that nobody resumes would otherwise stay in the store
/// forever. The sweeper runs on a cron schedule (tokio-cron-scheduler) and
/// purges every checkpoint older than the engine's TTL.

use crate::runtime::engine::WorkflowEngine;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Cron-driven purge of expired checkpoints
pub struct CheckpointSweeper {
    scheduler: Arc<RwLock<JobScheduler>>,
    engine: Arc<WorkflowEngine>,
    schedule: String,
    job: RwLock<Option<Uuid>>,
}

impl CheckpointSweeper {
    /// Create a sweeper that fires on `schedule` (six-field cron, seconds first)
    pub async fn new(engine: Arc<WorkflowEngine>, schedule: impl Into<String>) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            engine,
            schedule: schedule.into(),
            job: RwLock::new(None),
        })
    }

    /// Register the sweep job and start the scheduler
    ///
    /// Does nothing when the engine has no TTL configured.
    pub async fn start(&self) -> Result<()> {
        let Some(ttl) = self.engine.checkpoint_ttl() else {
            tracing::info!("⏭️ Checkpoint TTL disabled, sweeper not started");
            return Ok(());
        };

        tracing::info!(
            "⏰ Starting checkpoint sweeper ({}; ttl {}s)",
            self.schedule,
            ttl.num_seconds()
        );

        let engine = Arc::clone(&self.engine);
        let job = Job::new_async(self.schedule.as_str(), move |_uuid, _l| {
            let engine = Arc::clone(&engine);

            Box::pin(async move {
                match engine.purge_expired().await {
                    Ok(0) => tracing::debug!("🧹 Sweep found no expired checkpoints"),
                    Ok(purged) => tracing::info!("🧹 Purged {} expired checkpoints", purged),
                    Err(e) => tracing::error!("❌ Checkpoint sweep failed: {}", e),
                }
            })
        })?;

        {
            let scheduler = self.scheduler.write().await;
            let job_uuid = scheduler.add(job).await?;
            *self.job.write().await = Some(job_uuid);
            scheduler.start().await?;
        }

        tracing::info!("✅ Checkpoint sweeper started");
        Ok(())
    }

    /// Stop the scheduler
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping checkpoint sweeper");

        if let Some(job_uuid) = self.job.write().await.take() {
            let scheduler = self.scheduler.read().await;
            if let Err(e) = scheduler.remove(&job_uuid).await {
                tracing::warn!("⚠️ Failed to remove sweep job {}: {}", job_uuid, e);
            }
        }

        {
            let mut scheduler = self.scheduler.write().await;
            scheduler.shutdown().await?;
        }

        tracing::info!("✅ Checkpoint sweeper stopped");
        Ok(())
    }

    /// Whether the sweep job is registered
    pub async fn is_running(&self) -> bool {
        self.job.read().await.is_some()
    }
}
