//! Background analysis worker.
//!
//! Jobs arrive on a bounded queue once their asset has been moved to
//! `analyzing`. The worker runs the pipeline for each with bounded
//! concurrency and a per-job timeout, then stores the envelope or the
//! failure message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use casegen_core::{defaults, Error, MediaAsset, MediaRepository, MediaStatus, Result};

use crate::pipeline::VideoAnalysisPipeline;

/// Configuration for the analysis worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Timeout for one whole job in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
    /// Capacity of the job queue.
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `JOB_TIMEOUT_SECS` | `900` | Per-job timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            max_concurrent_jobs,
            job_timeout_secs,
            enabled,
            queue_capacity: defaults::JOB_QUEUE_CAPACITY,
        }
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// Set the per-job timeout.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the job queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Event emitted by the analysis worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, media_id: Uuid },
    /// A job completed and its result was stored.
    JobCompleted {
        job_id: Uuid,
        media_id: Uuid,
        strategy: String,
    },
    /// A job failed and the asset was marked failed.
    JobFailed {
        job_id: Uuid,
        media_id: Uuid,
        error: String,
    },
    /// A newer job took over the asset; this job's outcome was discarded.
    JobSuperseded { job_id: Uuid, media_id: Uuid },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// One queued analysis of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisJob {
    pub job_id: Uuid,
    pub media_id: Uuid,
}

impl AnalysisJob {
    /// The job that owns an asset's current `analyzing` run.
    pub fn for_asset(asset: &MediaAsset) -> Result<Self> {
        match (asset.status, asset.current_job) {
            (MediaStatus::Analyzing, Some(job_id)) => Ok(Self {
                job_id,
                media_id: asset.id,
            }),
            _ => Err(Error::Conflict(format!(
                "Media {} is not being analyzed",
                asset.id
            ))),
        }
    }
}

/// Sending side of the job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<AnalysisJob>,
}

impl JobQueue {
    /// Queue a job built with [`AnalysisJob::for_asset`]. Returns the job ID.
    pub fn enqueue(&self, job: AnalysisJob) -> Result<Uuid> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Internal("Analysis queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                Error::Internal("Analysis worker is not running".into())
            }
        })?;
        debug!(job_id = %job.job_id, media_id = %job.media_id, "Analysis job queued");
        Ok(job.job_id)
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    queue: JobQueue,
}

impl WorkerHandle {
    /// Signal the worker to shut down. In-flight jobs are finished first.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }

    /// Queue for submitting jobs to this worker.
    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }
}

/// Worker that analyzes queued media assets.
pub struct AnalysisWorker {
    repo: Arc<dyn MediaRepository>,
    pipeline: Arc<VideoAnalysisPipeline>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl AnalysisWorker {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        pipeline: Arc<VideoAnalysisPipeline>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            repo,
            pipeline,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (job_tx, job_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(job_rx, shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            queue: JobQueue { tx: job_tx },
        }
    }

    #[instrument(skip_all)]
    async fn run(self, mut jobs: mpsc::Receiver<AnalysisJob>, mut shutdown_rx: mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Analysis worker is disabled, not starting");
            return;
        }

        info!(
            max_concurrent = self.config.max_concurrent_jobs,
            job_timeout_secs = self.config.job_timeout_secs,
            "Analysis worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();

        loop {
            // Wait for a free slot first, then for a job, staying responsive
            // to shutdown and reaping finished tasks in both phases.
            let permit = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Analysis worker received shutdown signal");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_result(result);
                    continue;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Analysis worker received shutdown signal");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_result(result);
                    continue;
                }
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => {
                        debug!("Job queue closed");
                        break;
                    }
                },
            };

            let runner = self.runner();
            tasks.spawn(async move {
                runner.execute(job).await;
                drop(permit);
            });
        }

        while let Some(result) = tasks.join_next().await {
            log_task_result(result);
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Analysis worker stopped");
    }

    fn runner(&self) -> JobRunner {
        JobRunner {
            repo: self.repo.clone(),
            pipeline: self.pipeline.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }
}

fn log_task_result(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = ?e, "Analysis task panicked");
    }
}

/// References needed to execute one job in a spawned task.
struct JobRunner {
    repo: Arc<dyn MediaRepository>,
    pipeline: Arc<VideoAnalysisPipeline>,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobRunner {
    async fn execute(self, job: AnalysisJob) {
        let start = Instant::now();
        let AnalysisJob { job_id, media_id } = job;

        info!(%job_id, %media_id, "Processing analysis job");
        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, media_id });

        let outcome = match self.repo.get(media_id).await {
            Ok(asset) if asset.current_job != Some(job_id) => {
                self.superseded(job_id, media_id);
                return;
            }
            Ok(asset) => {
                match tokio::time::timeout(
                    self.job_timeout,
                    self.pipeline.run(&asset.storage_path, &asset.filename),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Unrecoverable(format!(
                        "Job exceeded timeout of {}s",
                        self.job_timeout.as_secs()
                    ))),
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(envelope) => {
                let strategy = envelope.strategy.clone();
                match self.repo.complete(media_id, job_id, envelope).await {
                    Ok(()) => {}
                    Err(Error::Superseded(_)) => {
                        self.superseded(job_id, media_id);
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, %job_id, %media_id, "Failed to store analysis result");
                        let _ = self.event_tx.send(WorkerEvent::JobFailed {
                            job_id,
                            media_id,
                            error: e.to_string(),
                        });
                        return;
                    }
                }
                info!(
                    %job_id,
                    %media_id,
                    %strategy,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Analysis job completed"
                );
                let _ = self.event_tx.send(WorkerEvent::JobCompleted {
                    job_id,
                    media_id,
                    strategy,
                });
            }
            Err(e) => {
                let error = e.to_string();
                match self.repo.fail(media_id, job_id, &error).await {
                    Ok(()) => warn!(
                        %job_id,
                        %media_id,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Analysis job failed"
                    ),
                    Err(Error::Superseded(_)) => {
                        self.superseded(job_id, media_id);
                        return;
                    }
                    Err(e) => {
                        error!(error = %e, %job_id, %media_id, "Failed to mark media as failed")
                    }
                }
                let _ = self.event_tx.send(WorkerEvent::JobFailed {
                    job_id,
                    media_id,
                    error,
                });
            }
        }
    }

    fn superseded(&self, job_id: Uuid, media_id: Uuid) {
        info!(%job_id, %media_id, "Analysis job superseded by a newer run, outcome discarded");
        let _ = self
            .event_tx
            .send(WorkerEvent::JobSuperseded { job_id, media_id });
    }
}
