//! Job orchestrator runner.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::RetryConfig;
use super::replay::decide;
use super::types::{Decision, OrchestratorError, OrchestratorStatus};
use crate::activity::Activities;
use crate::feed::validate_category;
use crate::history::{
    HistoryEntry, HistoryEvent, JobFilter, JobInput, JobRecord, JobStore, JobStoreError,
};

/// Interval between status polls in [`JobOrchestrator::wait_for_completion`].
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A job with a runner attached in this process.
struct LiveJob {
    terminate_tx: watch::Sender<Option<String>>,
    handle: JoinHandle<()>,
}

type LiveJobs = Arc<RwLock<HashMap<String, LiveJob>>>;

/// Everything a runner task needs.
#[derive(Clone)]
struct RunnerContext {
    store: Arc<dyn JobStore>,
    activities: Activities,
    retry: RetryConfig,
    live: LiveJobs,
}

/// How an await on an activity or a backoff ended.
enum Interrupt {
    Terminate,
    Detached,
}

/// The job orchestrator - drives jobs through fetch, store-raw,
/// parse-and-store and store-metadata.
///
/// Each live job gets one task that loops: read history, [`decide`], persist
/// the decision, run the activity, persist its outcome. All progress is in
/// the job store, so [`resume_incomplete`](Self::resume_incomplete) after a
/// restart continues every unfinished job from its last recorded event.
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    activities: Activities,
    retry: RetryConfig,
    live: LiveJobs,
}

impl JobOrchestrator {
    /// Create a new orchestrator.
    pub fn new(store: Arc<dyn JobStore>, activities: Activities, retry: RetryConfig) -> Self {
        Self {
            store,
            activities,
            retry,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a job and start running it.
    pub async fn start_job(&self, input: JobInput) -> Result<JobRecord, OrchestratorError> {
        validate_category(&input.category).map_err(OrchestratorError::InvalidInput)?;

        let job = self.store.create(&input)?;
        info!(
            job_id = %job.id,
            category = %input.category,
            process_date = %input.process_date,
            "Job created"
        );

        self.spawn_runner(job.id.clone()).await;
        Ok(job)
    }

    /// Attach runners to every job that has not finished. Returns how many
    /// were resumed.
    pub async fn resume_incomplete(&self) -> Result<usize, OrchestratorError> {
        let jobs = self.store.list(&JobFilter::incomplete())?;

        let mut resumed = 0;
        for job in jobs {
            if self.spawn_runner(job.id.clone()).await {
                info!(job_id = %job.id, state = ?job.state, "Resumed job");
                resumed += 1;
            }
        }

        if resumed > 0 {
            info!("Resumed {} incomplete jobs", resumed);
        }
        Ok(resumed)
    }

    pub fn status(&self, id: &str) -> Result<JobRecord, OrchestratorError> {
        self.store
            .get(id)?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, OrchestratorError> {
        Ok(self.store.list(filter)?)
    }

    pub fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, OrchestratorError> {
        Ok(self.store.history(id)?)
    }

    /// Orchestrator-level status.
    pub async fn orchestrator_status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            live_jobs: self.live.read().await.len(),
        }
    }

    /// Whether a runner is attached to this job in this process.
    pub async fn is_live(&self, id: &str) -> bool {
        self.live.read().await.contains_key(id)
    }

    /// Request termination of a running job.
    ///
    /// The request is recorded first and then signalled to the runner, which
    /// stops at its next await. An activity already in flight is left to
    /// finish on its own; its outcome is not recorded.
    pub async fn terminate(&self, id: &str, reason: &str) -> Result<(), OrchestratorError> {
        let job = self.status(id)?;
        if job.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal {
                id: id.to_string(),
                status: job.runtime_status,
            });
        }

        self.store.append(
            id,
            &HistoryEvent::TerminationRequested {
                reason: reason.to_string(),
            },
        )?;
        info!(job_id = %id, reason = %reason, "Termination requested");

        let signalled = match self.live.read().await.get(id) {
            Some(job) => {
                let _ = job.terminate_tx.send(Some(reason.to_string()));
                true
            }
            None => false,
        };

        if !signalled {
            // Nobody will replay this job here; close it out directly.
            self.store.append(
                id,
                &HistoryEvent::OrchestratorTerminated {
                    reason: reason.to_string(),
                },
            )?;
            info!(job_id = %id, "Job terminated");
        }

        Ok(())
    }

    /// Record an external event in the job's history.
    pub async fn raise_event(
        &self,
        id: &str,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        self.store.append(
            id,
            &HistoryEvent::EventRaised {
                name: name.to_string(),
                payload,
            },
        )?;
        debug!(job_id = %id, event = %name, "Event raised");
        Ok(())
    }

    /// Delete a finished job and its history.
    pub async fn purge(&self, id: &str) -> Result<(), OrchestratorError> {
        let job = self.status(id)?;
        if !job.is_terminal() {
            return Err(OrchestratorError::NotTerminal {
                id: id.to_string(),
                status: job.runtime_status,
            });
        }

        if !self.store.purge(id)? {
            return Err(OrchestratorError::NotFound(id.to_string()));
        }
        info!(job_id = %id, "Job purged");
        Ok(())
    }

    /// Poll until the job is terminal or `timeout` elapses.
    pub async fn wait_for_completion(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<JobRecord, OrchestratorError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let job = self.status(id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(OrchestratorError::Timeout(id.to_string()));
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Detach every runner. Jobs stay incomplete in the store and resume on
    /// the next [`resume_incomplete`](Self::resume_incomplete).
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut live = self.live.write().await;
            live.drain().map(|(_, job)| job.handle).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!("Stopping {} job runners", handles.len());
        for handle in &handles {
            handle.abort();
        }
        join_all(handles).await;
    }

    /// Spawn a runner for `id` unless one is already attached.
    async fn spawn_runner(&self, id: String) -> bool {
        let mut live = self.live.write().await;
        if live.contains_key(&id) {
            return false;
        }

        let (terminate_tx, terminate_rx) = watch::channel(None);
        let ctx = RunnerContext {
            store: Arc::clone(&self.store),
            activities: self.activities.clone(),
            retry: self.retry.clone(),
            live: Arc::clone(&self.live),
        };
        // The runner deregisters itself, which needs this write lock, so it
        // cannot finish before its entry is inserted.
        let handle = tokio::spawn(Self::run_job(ctx, id.clone(), terminate_rx));
        live.insert(
            id,
            LiveJob {
                terminate_tx,
                handle,
            },
        );
        true
    }

    async fn run_job(ctx: RunnerContext, id: String, mut terminate_rx: watch::Receiver<Option<String>>) {
        debug!(job_id = %id, "Runner started");

        if let Err(e) = Self::drive(&ctx, &id, &mut terminate_rx).await {
            error!(job_id = %id, error = %e, "Runner stopped on store error");
        }

        ctx.live.write().await.remove(&id);
        debug!(job_id = %id, "Runner finished");
    }

    /// The replay loop. Returns when the job is terminal or detached.
    async fn drive(
        ctx: &RunnerContext,
        id: &str,
        terminate_rx: &mut watch::Receiver<Option<String>>,
    ) -> Result<(), JobStoreError> {
        loop {
            let Some(job) = ctx.store.get(id)? else {
                warn!(job_id = %id, "Job disappeared while running");
                return Ok(());
            };
            if job.is_terminal() {
                return Ok(());
            }

            let history = ctx.store.history(id)?;
            if history.is_empty() {
                ctx.store.append(
                    id,
                    &HistoryEvent::OrchestratorStarted {
                        input: job.input.clone(),
                    },
                )?;
                info!(job_id = %id, "Job started");
                continue;
            }

            match decide(&job.input, &history, &ctx.retry) {
                Decision::Finished => return Ok(()),
                Decision::Terminate(reason) => {
                    ctx.store
                        .append(id, &HistoryEvent::OrchestratorTerminated { reason })?;
                    info!(job_id = %id, state = ?job.state, "Job terminated");
                    return Ok(());
                }
                Decision::Fail(reason) => {
                    warn!(job_id = %id, reason = %reason, "Job failed");
                    ctx.store
                        .append(id, &HistoryEvent::OrchestratorFailed { reason })?;
                    return Ok(());
                }
                Decision::Complete(result) => {
                    info!(
                        job_id = %id,
                        parsed = result.parsed_articles,
                        successful = result.successful_writes,
                        failed = result.failed_writes,
                        "Job completed"
                    );
                    ctx.store
                        .append(id, &HistoryEvent::OrchestratorCompleted { result })?;
                    return Ok(());
                }
                Decision::Schedule {
                    step,
                    attempt,
                    input,
                    backoff,
                } => {
                    if !backoff.is_zero() {
                        debug!(job_id = %id, %step, attempt, ?backoff, "Backing off before retry");
                        match Self::interruptible(tokio::time::sleep(backoff), terminate_rx).await {
                            Ok(()) => {}
                            Err(Interrupt::Terminate) => continue,
                            Err(Interrupt::Detached) => return Ok(()),
                        }
                    }

                    match ctx
                        .store
                        .append(id, &HistoryEvent::ActivityScheduled { step, attempt })
                    {
                        Ok(_) => {}
                        // Termination landed after this decision; replay again.
                        Err(JobStoreError::TerminationPending(_)) => continue,
                        Err(JobStoreError::AlreadyTerminal { .. }) => return Ok(()),
                        Err(e) => return Err(e),
                    }
                    info!(job_id = %id, %step, attempt, "Activity scheduled");

                    let activities = ctx.activities.clone();
                    let task = tokio::spawn(async move { activities.invoke(input).await });

                    let joined = match Self::interruptible(task, terminate_rx).await {
                        Ok(joined) => joined,
                        Err(Interrupt::Terminate) => {
                            info!(job_id = %id, %step, "Termination requested with activity in flight");
                            continue;
                        }
                        Err(Interrupt::Detached) => return Ok(()),
                    };

                    let event = match joined {
                        Ok(Ok(output)) => {
                            debug!(job_id = %id, %step, attempt, "Activity completed");
                            HistoryEvent::ActivityCompleted { step, output }
                        }
                        Ok(Err(e)) => {
                            warn!(job_id = %id, %step, attempt, error = %e, retryable = e.is_retryable(), "Activity failed");
                            HistoryEvent::ActivityFailed {
                                step,
                                attempt,
                                error: e.to_string(),
                                retryable: e.is_retryable(),
                            }
                        }
                        Err(e) => {
                            error!(job_id = %id, %step, attempt, error = %e, "Activity task panicked");
                            HistoryEvent::ActivityFailed {
                                step,
                                attempt,
                                error: format!("activity task failed: {}", e),
                                retryable: true,
                            }
                        }
                    };

                    match ctx.store.append(id, &event) {
                        Ok(_) => {}
                        // Terminated concurrently; nothing left to record.
                        Err(JobStoreError::AlreadyTerminal { .. }) => return Ok(()),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    /// Await `fut` unless a termination signal arrives first.
    async fn interruptible<F: std::future::Future>(
        fut: F,
        terminate_rx: &mut watch::Receiver<Option<String>>,
    ) -> Result<F::Output, Interrupt> {
        tokio::select! {
            output = fut => Ok(output),
            changed = terminate_rx.changed() => match changed {
                Ok(()) => Err(Interrupt::Terminate),
                Err(_) => Err(Interrupt::Detached),
            },
        }
    }
}
