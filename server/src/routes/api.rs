use std::fmt::Write as _;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use claimmap_engine::WorkerCountersSnapshot;

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    let worker = state.worker.counters();
    Json(serde_json::json!({
        "status": "ok",
        "latest_generation": state.worker.latest_generation(),
        "engine": state.worker.config(),
        "worker": {
            "runs_started_total": worker.runs_started_total,
            "runs_completed_total": worker.runs_completed_total,
            "runs_failed_total": worker.runs_failed_total,
            "union_fallbacks_total": worker.union_fallbacks_total,
            "messages_emitted_total": worker.messages_emitted_total,
        },
        "observability": {
            "compute_requests_total": observability.compute_requests_total,
            "rejected_requests_total": observability.rejected_requests_total,
            "lagged_streams_total": observability.lagged_streams_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(
        state.worker.latest_generation(),
        state.worker.counters(),
        state.observability.snapshot(),
    );

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn write_metric(body: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(body, "# HELP {name} {help}");
    let _ = writeln!(body, "# TYPE {name} {kind}");
    let _ = writeln!(body, "{name} {value}");
}

fn render_prometheus_metrics(
    latest_generation: u64,
    worker: WorkerCountersSnapshot,
    observability: ObservabilitySnapshot,
) -> String {
    let mut body = String::new();
    write_metric(
        &mut body,
        "claimmap_latest_generation",
        "gauge",
        "Generation of the most recently submitted computation.",
        latest_generation,
    );
    write_metric(
        &mut body,
        "claimmap_runs_started_total",
        "counter",
        "Territory computations started by the worker.",
        worker.runs_started_total,
    );
    write_metric(
        &mut body,
        "claimmap_runs_completed_total",
        "counter",
        "Territory computations that emitted a final result.",
        worker.runs_completed_total,
    );
    write_metric(
        &mut body,
        "claimmap_runs_failed_total",
        "counter",
        "Territory computations whose task panicked.",
        worker.runs_failed_total,
    );
    write_metric(
        &mut body,
        "claimmap_union_fallbacks_total",
        "counter",
        "Pairwise polygon unions that failed and kept the left operand.",
        worker.union_fallbacks_total,
    );
    write_metric(
        &mut body,
        "claimmap_messages_emitted_total",
        "counter",
        "Progress and territories messages emitted by the worker.",
        worker.messages_emitted_total,
    );
    write_metric(
        &mut body,
        "claimmap_compute_requests_total",
        "counter",
        "Compute requests received over HTTP.",
        observability.compute_requests_total,
    );
    write_metric(
        &mut body,
        "claimmap_rejected_requests_total",
        "counter",
        "Compute requests rejected as malformed.",
        observability.rejected_requests_total,
    );
    write_metric(
        &mut body,
        "claimmap_lagged_streams_total",
        "counter",
        "Times a result stream fell behind the engine event buffer.",
        observability.lagged_streams_total,
    );
    body
}
