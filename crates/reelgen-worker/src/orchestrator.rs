//! Job orchestrator.
//!
//! `submit` validates and records the job, then hands the stage pipeline to
//! its own tokio task. Stage failures and panics end up on the job record;
//! they never reach the caller or other jobs.

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use reelgen_media::Compositor;
use reelgen_models::{Job, JobId, JobOptions, JobStatus};
use reelgen_providers::{ImageChain, SpeechChain};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::pipeline::{JobRun, PipelineContext};
use crate::store::{InMemoryJobStore, JobStore};
use crate::workspace::TempWorkspace;

const OPERATION: &str = "video_generation";

struct JobTask {
    handle: JoinHandle<()>,
    cancel: watch::Sender<bool>,
}

/// Runs video generation jobs in the background.
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
    store: Arc<dyn JobStore>,
    tasks: Mutex<HashMap<JobId, JobTask>>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        speech: Arc<SpeechChain>,
        images: Arc<ImageChain>,
        compositor: Arc<dyn Compositor>,
    ) -> Self {
        Self {
            ctx: Arc::new(PipelineContext {
                config,
                speech,
                images,
                compositor,
            }),
            store: Arc::new(InMemoryJobStore::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.ctx.config
    }

    /// Validate `options`, record a processing job and start its pipeline.
    ///
    /// Input errors are returned here; everything after the job exists is
    /// reported through the job record.
    pub async fn submit(&self, options: JobOptions) -> WorkerResult<Job> {
        options.validate()?;
        if let Some(missing) = options
            .images
            .iter()
            .chain(options.audio.iter())
            .find(|path| !path.is_file())
        {
            return Err(WorkerError::ResourceMissing(missing.clone()));
        }

        let job = Job::new(options);
        let workspace = TempWorkspace::create(&self.ctx.config.work_dir, &job.id).await?;
        self.store.insert(job.clone()).await;

        let logger = JobLogger::new(&job.id, OPERATION);
        let span = logger.create_span();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(
            run_job(
                self.ctx.clone(),
                self.store.clone(),
                job.id.clone(),
                job.options.clone(),
                workspace,
                logger,
                cancel_rx,
            )
            .instrument(span),
        );

        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        tasks.retain(|_, task| !task.handle.is_finished());
        tasks.insert(
            job.id.clone(),
            JobTask {
                handle,
                cancel: cancel_tx,
            },
        );

        info!(job_id = %job.id, title = %job.title, "Job submitted");
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.store.get(id).await
    }

    /// Jobs sorted by start time.
    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.store.list(status).await
    }

    /// Wait for the job's task to finish and return the final record.
    pub async fn wait(&self, id: &JobId) -> WorkerResult<Job> {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(id);
        if let Some(task) = task {
            // Panics are recorded on the job inside the task
            let _ = task.handle.await;
        }
        self.store
            .get(id)
            .await
            .ok_or_else(|| WorkerError::JobNotFound(id.clone()))
    }

    /// Wait for running jobs up to the shutdown timeout, then ask the rest
    /// to stop at their next stage boundary.
    pub async fn shutdown(&self) {
        let tasks: Vec<JobTask> = self
            .tasks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain()
            .map(|(_, task)| task)
            .collect();
        if tasks.is_empty() {
            return;
        }

        let (handles, cancels): (Vec<_>, Vec<_>) = tasks.into_iter().map(|t| (t.handle, t.cancel)).unzip();
        let mut all = Box::pin(futures::future::join_all(handles));
        let timeout = self.ctx.config.shutdown_timeout;
        if tokio::time::timeout(timeout, &mut all).await.is_err() {
            warn!(
                jobs = cancels.len(),
                timeout_secs = timeout.as_secs(),
                "Jobs still running at shutdown, cancelling"
            );
            for cancel in &cancels {
                let _ = cancel.send(true);
            }
            let _ = all.await;
        }
    }
}

async fn run_job(
    ctx: Arc<PipelineContext>,
    store: Arc<dyn JobStore>,
    job_id: JobId,
    options: JobOptions,
    workspace: TempWorkspace,
    logger: JobLogger,
    cancel: watch::Receiver<bool>,
) {
    logger.log_start(&options.title);

    let run = JobRun {
        ctx: &ctx,
        store: store.as_ref(),
        job_id: &job_id,
        options: &options,
        workspace: &workspace,
        logger: &logger,
        cancel: &cancel,
    };
    let outcome = AssertUnwindSafe(run.execute()).catch_unwind().await;
    let retain_failed = ctx.config.retain_failed_workspaces;

    match outcome {
        Ok(Ok(output)) => {
            if store.complete(&job_id, &output.display().to_string()).await {
                metrics::counter!("reelgen_jobs_completed_total").increment(1);
                logger.log_completion(&output.display().to_string());
            }
            workspace.finish(true, retain_failed).await;
        }
        Ok(Err(e)) => {
            record_failure(store.as_ref(), &job_id, &logger, &e.to_string()).await;
            workspace.finish(false, retain_failed).await;
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            record_failure(store.as_ref(), &job_id, &logger, &format!("internal: {reason}")).await;
            workspace.finish(false, retain_failed).await;
        }
    }
}

async fn record_failure(store: &dyn JobStore, job_id: &JobId, logger: &JobLogger, message: &str) {
    if store.fail(job_id, message).await {
        metrics::counter!("reelgen_jobs_failed_total").increment(1);
        logger.log_error(message);
    }
}
