use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use claimmap_engine::{EngineConfig, WorkerHandle, worker};

use crate::config::{engine_event_buffer, worker_queue_depth};

#[derive(Clone)]
pub struct AppState {
    pub worker: WorkerHandle,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    compute_requests_total: AtomicU64,
    rejected_requests_total: AtomicU64,
    lagged_streams_total: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct ObservabilitySnapshot {
    pub compute_requests_total: u64,
    pub rejected_requests_total: u64,
    pub lagged_streams_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            compute_requests_total: self.compute_requests_total.load(Ordering::Relaxed),
            rejected_requests_total: self.rejected_requests_total.load(Ordering::Relaxed),
            lagged_streams_total: self.lagged_streams_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_compute_request(&self) {
        self.compute_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_request(&self) {
        self.rejected_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lagged_stream(&self) {
        self.lagged_streams_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    /// Spawns the territory worker; must be called inside a Tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            worker: worker::spawn(config, worker_queue_depth(), engine_event_buffer()),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }
}
