use claimmap_engine::EngineConfig;
use claimmap_engine::config::{
    DEFAULT_BASE_RADIUS_KM, DEFAULT_COALITION_BONUS, DEFAULT_GRID_STEP_DEG,
    DEFAULT_LOCAL_RADIUS_KM, DEFAULT_MAX_RADIUS_KM, DEFAULT_PER_LIKE_KM,
    DEFAULT_SIMPLIFY_TOLERANCE_DEG, DEFAULT_SMOOTHING_ITERATIONS,
};

pub const DEFAULT_SERVER_PORT: u16 = 3000;
pub const DEFAULT_WORKER_QUEUE_DEPTH: usize = 32;
pub const DEFAULT_ENGINE_EVENT_BUFFER: usize = 256;
pub const SSE_KEEPALIVE_SECS: u64 = 15;

fn env_f64(name: &str, default: f64, accept: impl Fn(f64) -> bool) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && accept(*value))
        .unwrap_or(default)
}

pub fn server_port() -> u16 {
    std::env::var("SERVER_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

pub fn worker_queue_depth() -> usize {
    std::env::var("WORKER_QUEUE_DEPTH")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_WORKER_QUEUE_DEPTH)
}

pub fn engine_event_buffer() -> usize {
    std::env::var("ENGINE_EVENT_BUFFER")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_ENGINE_EVENT_BUFFER)
}

pub fn smoothing_iterations() -> u32 {
    std::env::var("SMOOTHING_ITERATIONS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value <= 8)
        .unwrap_or(DEFAULT_SMOOTHING_ITERATIONS)
}

/// Engine tuning with per-knob environment overrides.
pub fn engine_config() -> EngineConfig {
    let positive = |value: f64| value > 0.0;
    let non_negative = |value: f64| value >= 0.0;
    EngineConfig {
        grid_step_deg: env_f64("GRID_STEP_DEG", DEFAULT_GRID_STEP_DEG, positive),
        base_radius_km: env_f64("BASE_RADIUS_KM", DEFAULT_BASE_RADIUS_KM, positive),
        per_like_km: env_f64("PER_LIKE_KM", DEFAULT_PER_LIKE_KM, non_negative),
        max_radius_km: env_f64("MAX_RADIUS_KM", DEFAULT_MAX_RADIUS_KM, positive),
        coalition_bonus: env_f64("COALITION_BONUS", DEFAULT_COALITION_BONUS, non_negative),
        local_radius_km: env_f64("LOCAL_RADIUS_KM", DEFAULT_LOCAL_RADIUS_KM, positive),
        simplify_tolerance_deg: env_f64(
            "SIMPLIFY_TOLERANCE_DEG",
            DEFAULT_SIMPLIFY_TOLERANCE_DEG,
            non_negative,
        ),
        smoothing_iterations: smoothing_iterations(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_without_env() {
        temp_env::with_vars_unset(
            [
                "GRID_STEP_DEG",
                "BASE_RADIUS_KM",
                "PER_LIKE_KM",
                "MAX_RADIUS_KM",
                "COALITION_BONUS",
                "LOCAL_RADIUS_KM",
                "SIMPLIFY_TOLERANCE_DEG",
                "SMOOTHING_ITERATIONS",
            ],
            || assert_eq!(engine_config(), EngineConfig::default()),
        );
    }

    #[test]
    fn engine_config_reads_overrides() {
        temp_env::with_vars(
            [
                ("GRID_STEP_DEG", Some("0.001")),
                ("COALITION_BONUS", Some("0")),
                ("SMOOTHING_ITERATIONS", Some("1")),
            ],
            || {
                let config = engine_config();
                assert_eq!(config.grid_step_deg, 0.001);
                assert_eq!(config.coalition_bonus, 0.0);
                assert_eq!(config.smoothing_iterations, 1);
            },
        );
    }

    #[test]
    fn invalid_overrides_fall_back_to_defaults() {
        temp_env::with_vars(
            [
                ("GRID_STEP_DEG", Some("-1")),
                ("MAX_RADIUS_KM", Some("NaN")),
                ("LOCAL_RADIUS_KM", Some("far")),
                ("SMOOTHING_ITERATIONS", Some("64")),
            ],
            || {
                let config = engine_config();
                assert_eq!(config.grid_step_deg, DEFAULT_GRID_STEP_DEG);
                assert_eq!(config.max_radius_km, DEFAULT_MAX_RADIUS_KM);
                assert_eq!(config.local_radius_km, DEFAULT_LOCAL_RADIUS_KM);
                assert_eq!(config.smoothing_iterations, DEFAULT_SMOOTHING_ITERATIONS);
            },
        );
    }

    #[test]
    fn worker_sizes_reject_zero() {
        temp_env::with_vars(
            [
                ("WORKER_QUEUE_DEPTH", Some("0")),
                ("ENGINE_EVENT_BUFFER", Some("512")),
                ("SERVER_PORT", Some("8080")),
            ],
            || {
                assert_eq!(worker_queue_depth(), DEFAULT_WORKER_QUEUE_DEPTH);
                assert_eq!(engine_event_buffer(), 512);
                assert_eq!(server_port(), 8080);
            },
        );
    }
}
