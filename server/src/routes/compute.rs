use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use claimmap_shared::{EngineMessage, EngineRequest, Position};
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, warn};

use crate::config::SSE_KEEPALIVE_SECS;
use crate::state::AppState;

/// Stream one computation as SSE: progress events, one partial `territories`
/// event and a final one, after which the stream ends. Event ids carry the
/// run generation. A failed run, or a client too slow to keep up with the
/// engine's event buffer, gets a `failed` event instead of the final one.
pub async fn compute_territories(
    State(state): State<AppState>,
    Json(request): Json<EngineRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    state.observability.record_compute_request();

    if let Err(reason) = validate_request(&request) {
        state.observability.record_rejected_request();
        warn!(%reason, "rejected territory request");
        return Err((StatusCode::BAD_REQUEST, reason));
    }

    // Subscribe before submitting so no message of this run is missed.
    let rx = state.worker.subscribe();
    let generation = state.worker.submit(request).await.map_err(|e| {
        error!(error = %e, "failed to submit territory request");
        (StatusCode::SERVICE_UNAVAILABLE, e)
    })?;

    let observability = state.observability.clone();
    let stream = async_stream::stream! {
        let mut stream = BroadcastStream::new(rx);

        while let Some(result) = stream.next().await {
            match result {
                Ok(message) => {
                    if message.generation() != generation {
                        continue;
                    }
                    let is_terminal = message.is_terminal();
                    if let Some(event) = sse_event(&message) {
                        yield Ok(event);
                    }
                    if is_terminal {
                        break;
                    }
                }
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
                    // The final result may be among the skipped events.
                    observability.record_lagged_stream();
                    warn!(
                        generation,
                        skipped_events = skipped,
                        "territory stream lagged behind engine event buffer"
                    );
                    let failed = EngineMessage::Failed {
                        generation,
                        reason: format!("stream fell {skipped} events behind; resubmit the request"),
                    };
                    if let Some(event) = sse_event(&failed) {
                        yield Ok(event);
                    }
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keep-alive"),
    ))
}

fn sse_event(message: &EngineMessage) -> Option<Event> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(
            Event::default()
                .id(message.generation().to_string())
                .event(message.kind())
                .data(payload),
        ),
        Err(e) => {
            warn!(error = %e, kind = message.kind(), "failed to serialize engine message");
            None
        }
    }
}

fn valid_position([lon, lat]: Position) -> bool {
    lon.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)
}

/// The engine assumes well-formed points; reject anything else here.
pub(crate) fn validate_request(request: &EngineRequest) -> Result<(), String> {
    if !valid_position(request.focus) {
        return Err("focus must be a finite [lon, lat] pair".to_string());
    }
    for (idx, point) in request.points.iter().enumerate() {
        if !valid_position(point.coordinates) {
            return Err(format!("point {idx}: coordinates must be a finite [lon, lat] pair"));
        }
        if point.faction_id.trim().is_empty() {
            return Err(format!("point {idx}: factionId must not be empty"));
        }
        if point.likes < 0 {
            return Err(format!("point {idx}: likes must not be negative"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use claimmap_engine::EngineConfig;
    use claimmap_shared::PointClaim;
    use tower::ServiceExt;

    use super::*;
    use crate::app::build_app;
    use crate::state::ObservabilityCounters;

    fn point(faction: &str, lon: f64, lat: f64, likes: i64) -> PointClaim {
        PointClaim {
            coordinates: [lon, lat],
            faction_id: faction.to_string(),
            color: String::new(),
            likes,
        }
    }

    fn compute_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/territories/compute")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("build request")
    }

    /// `data:` payloads of the SSE body, parsed as engine messages.
    fn parse_events(body: &str) -> Vec<EngineMessage> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).expect("engine message json"))
            .collect()
    }

    #[test]
    fn validate_request_rejects_malformed_points() {
        let ok = EngineRequest {
            points: vec![point("red", 2.0, 48.0, 3)],
            focus: [2.0, 48.0],
        };
        assert_eq!(validate_request(&ok), Ok(()));

        let mut bad_focus = ok.clone();
        bad_focus.focus = [f64::NAN, 0.0];
        assert!(validate_request(&bad_focus).is_err());

        let mut negative = ok.clone();
        negative.points[0].likes = -1;
        assert!(
            validate_request(&negative)
                .expect_err("negative likes")
                .contains("likes")
        );

        let mut unnamed = ok.clone();
        unnamed.points[0].faction_id = "  ".to_string();
        assert!(validate_request(&unnamed).is_err());

        let mut out_of_range = ok;
        out_of_range.points[0].coordinates = [200.0, 0.0];
        assert!(validate_request(&out_of_range).is_err());
    }

    #[tokio::test]
    async fn compute_streams_partial_then_final_territories() {
        let app = build_app(AppState::new(EngineConfig::default()));
        let request = EngineRequest {
            points: vec![point("red", 2.0, 48.0, 10), point("blue", 4.0, 48.0, 10)],
            focus: [2.0, 48.0],
        };
        let response = app
            .oneshot(compute_request(
                serde_json::to_string(&request).expect("encode request"),
            ))
            .await
            .expect("compute response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read sse body");
        let body = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
        let kinds: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(str::trim)
            .collect();
        assert_eq!(kinds.first(), Some(&"progress"));
        assert_eq!(kinds.last(), Some(&"territories"));

        let messages = parse_events(&body);
        assert!(messages.iter().all(|m| m.generation() == 1));
        let territories: Vec<(bool, usize)> = messages
            .iter()
            .filter_map(|m| match m {
                EngineMessage::Territories {
                    partial,
                    territories,
                    ..
                } => Some((*partial, territories.len())),
                _ => None,
            })
            .collect();
        assert_eq!(territories, vec![(true, 1), (false, 2)]);
    }

    #[tokio::test]
    async fn compute_rejects_negative_likes() {
        let app = build_app(AppState::new(EngineConfig::default()));
        let body = r#"{"points":[{"coordinates":[0,0],"factionId":"red","likes":-4}],"focus":[0,0]}"#;
        let response = app
            .oneshot(compute_request(body.to_string()))
            .await
            .expect("compute response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn compute_with_no_points_returns_empty_results() {
        let app = build_app(AppState::new(EngineConfig::default()));
        let response = app
            .oneshot(compute_request(r#"{"points":[],"focus":[0,0]}"#.to_string()))
            .await
            .expect("compute response");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read sse body");
        let messages = parse_events(std::str::from_utf8(&bytes).expect("utf-8 body"));
        let results: Vec<_> = messages
            .iter()
            .filter(|m| matches!(m, EngineMessage::Territories { .. }))
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|m| matches!(
            m,
            EngineMessage::Territories { territories, .. } if territories.is_empty()
        )));
    }

    #[tokio::test]
    async fn lagging_stream_ends_with_failed_event() {
        let state = AppState {
            worker: claimmap_engine::worker::spawn(EngineConfig::default(), 4, 1),
            observability: std::sync::Arc::new(ObservabilityCounters::default()),
        };
        let app = build_app(state.clone());
        let request = EngineRequest {
            points: vec![point("red", 2.0, 48.0, 10), point("blue", 4.0, 48.0, 10)],
            focus: [2.0, 48.0],
        };
        let response = app
            .oneshot(compute_request(
                serde_json::to_string(&request).expect("encode request"),
            ))
            .await
            .expect("compute response");
        assert_eq!(response.status(), StatusCode::OK);

        // Let the run overflow the one-slot buffer before reading anything.
        for _ in 0..500 {
            if state.worker.counters().runs_completed_total == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.worker.counters().runs_completed_total, 1);

        let bytes = tokio::time::timeout(
            Duration::from_secs(10),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("sse body should end")
        .expect("read sse body");
        let messages = parse_events(std::str::from_utf8(&bytes).expect("utf-8 body"));
        assert!(matches!(
            messages.last(),
            Some(EngineMessage::Failed { generation: 1, .. })
        ));
        assert_eq!(state.observability.snapshot().lagged_streams_total, 1);
    }

    #[tokio::test]
    async fn compute_at_the_pole_completes() {
        let app = build_app(AppState::new(EngineConfig::default()));
        let body = r#"{"points":[{"coordinates":[0,90],"factionId":"red","likes":3},{"coordinates":[10,-90],"factionId":"blue"}],"focus":[0,90]}"#;
        let response = app
            .oneshot(compute_request(body.to_string()))
            .await
            .expect("compute response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = tokio::time::timeout(
            Duration::from_secs(30),
            axum::body::to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("polar run should finish")
        .expect("read sse body");
        let messages = parse_events(std::str::from_utf8(&bytes).expect("utf-8 body"));
        assert!(messages.last().is_some_and(EngineMessage::is_final));
    }
}
