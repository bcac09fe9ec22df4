use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use claimmap_shared::{EngineMessage, EngineRequest};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::orchestrator::{Orchestrator, RunSummary};

/// Executes one job on the blocking pool.
type RunJob = fn(&Orchestrator, &EngineRequest, u64, &mut dyn FnMut(EngineMessage)) -> RunSummary;

#[derive(Debug)]
struct Job {
    generation: u64,
    request: EngineRequest,
}

#[derive(Debug, Default)]
pub struct WorkerCounters {
    runs_started_total: AtomicU64,
    runs_completed_total: AtomicU64,
    runs_failed_total: AtomicU64,
    union_fallbacks_total: AtomicU64,
    messages_emitted_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCountersSnapshot {
    pub runs_started_total: u64,
    pub runs_completed_total: u64,
    pub runs_failed_total: u64,
    pub union_fallbacks_total: u64,
    pub messages_emitted_total: u64,
}

impl WorkerCounters {
    pub fn snapshot(&self) -> WorkerCountersSnapshot {
        WorkerCountersSnapshot {
            runs_started_total: self.runs_started_total.load(Ordering::Relaxed),
            runs_completed_total: self.runs_completed_total.load(Ordering::Relaxed),
            runs_failed_total: self.runs_failed_total.load(Ordering::Relaxed),
            union_fallbacks_total: self.union_fallbacks_total.load(Ordering::Relaxed),
            messages_emitted_total: self.messages_emitted_total.load(Ordering::Relaxed),
        }
    }
}

/// Caller side of the background territory worker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    jobs: mpsc::Sender<Job>,
    events: broadcast::Sender<EngineMessage>,
    latest_generation: Arc<AtomicU64>,
    counters: Arc<WorkerCounters>,
    config: EngineConfig,
}

impl WorkerHandle {
    /// Subscribe before [`submit`](Self::submit) to be sure of seeing every
    /// message of the submitted run.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineMessage> {
        self.events.subscribe()
    }

    /// Queue a computation and return its generation. Generations increase
    /// by one per submission, starting at 1.
    pub async fn submit(&self, request: EngineRequest) -> Result<u64, String> {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs
            .send(Job {
                generation,
                request,
            })
            .await
            .map_err(|_| "territory worker has stopped".to_string())?;
        Ok(generation)
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_generation.load(Ordering::SeqCst)
    }

    /// Whether output tagged `generation` is still the newest requested.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.latest_generation()
    }

    pub fn counters(&self) -> WorkerCountersSnapshot {
        self.counters.snapshot()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Spawn the worker task. Runs execute one after another on the blocking
/// pool; every message goes out on the broadcast channel. A run whose task
/// fails still ends its generation with an [`EngineMessage::Failed`].
pub fn spawn(config: EngineConfig, queue_depth: usize, event_buffer: usize) -> WorkerHandle {
    spawn_with(config, queue_depth, event_buffer, Orchestrator::run)
}

fn spawn_with(
    config: EngineConfig,
    queue_depth: usize,
    event_buffer: usize,
    run_job: RunJob,
) -> WorkerHandle {
    let (jobs_tx, jobs_rx) = mpsc::channel(queue_depth.max(1));
    let (events_tx, _) = broadcast::channel(event_buffer.max(1));
    let counters = Arc::new(WorkerCounters::default());

    tokio::spawn(run(
        Orchestrator::new(config),
        jobs_rx,
        events_tx.clone(),
        counters.clone(),
        run_job,
    ));

    WorkerHandle {
        jobs: jobs_tx,
        events: events_tx,
        latest_generation: Arc::new(AtomicU64::new(0)),
        counters,
        config,
    }
}

async fn run(
    orchestrator: Orchestrator,
    mut jobs: mpsc::Receiver<Job>,
    events: broadcast::Sender<EngineMessage>,
    counters: Arc<WorkerCounters>,
    run_job: RunJob,
) {
    info!(config = ?orchestrator.config(), "territory worker started");

    while let Some(job) = jobs.recv().await {
        let generation = job.generation;
        counters.runs_started_total.fetch_add(1, Ordering::Relaxed);

        let orchestrator = orchestrator.clone();
        let run_events = events.clone();
        let task = tokio::task::spawn_blocking(move || {
            run_job(&orchestrator, &job.request, job.generation, &mut |message| {
                if run_events.send(message).is_err() {
                    debug!(generation = job.generation, "no subscribers for engine message");
                }
            })
        });

        match task.await {
            Ok(summary) => {
                counters.runs_completed_total.fetch_add(1, Ordering::Relaxed);
                counters
                    .union_fallbacks_total
                    .fetch_add(summary.union_fallbacks as u64, Ordering::Relaxed);
                counters
                    .messages_emitted_total
                    .fetch_add(summary.messages_emitted as u64, Ordering::Relaxed);
                if summary.union_fallbacks > 0 {
                    warn!(
                        generation,
                        union_fallbacks = summary.union_fallbacks,
                        "run recovered from failed unions"
                    );
                }
            }
            Err(e) => {
                counters.runs_failed_total.fetch_add(1, Ordering::Relaxed);
                counters.messages_emitted_total.fetch_add(1, Ordering::Relaxed);
                error!(generation, error = %e, "territory computation task failed");
                let failed = EngineMessage::Failed {
                    generation,
                    reason: "territory computation failed".to_string(),
                };
                if events.send(failed).is_err() {
                    debug!(generation, "no subscribers for failed run");
                }
            }
        }
    }

    info!("territory worker stopped: all handles dropped");
}
