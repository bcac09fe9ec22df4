use serde::{Deserialize, Serialize};

pub const DEFAULT_GRID_STEP_DEG: f64 = 0.002;
pub const DEFAULT_BASE_RADIUS_KM: f64 = 0.5;
pub const DEFAULT_PER_LIKE_KM: f64 = 0.1;
pub const DEFAULT_MAX_RADIUS_KM: f64 = 5.0;
pub const DEFAULT_COALITION_BONUS: f64 = 0.5;
pub const DEFAULT_LOCAL_RADIUS_KM: f64 = 25.0;
pub const DEFAULT_SIMPLIFY_TOLERANCE_DEG: f64 = 0.00005;
pub const DEFAULT_SMOOTHING_ITERATIONS: u32 = 3;

/// Tuning for one engine instance. Immutable once handed to an
/// [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Angular size of one grid cell, in degrees on both axes.
    pub grid_step_deg: f64,
    pub base_radius_km: f64,
    pub per_like_km: f64,
    pub max_radius_km: f64,
    /// Force added per overlapping same-faction neighbour.
    pub coalition_bonus: f64,
    /// Points within this distance of the focus are part of the local pass.
    pub local_radius_km: f64,
    pub simplify_tolerance_deg: f64,
    pub smoothing_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_step_deg: DEFAULT_GRID_STEP_DEG,
            base_radius_km: DEFAULT_BASE_RADIUS_KM,
            per_like_km: DEFAULT_PER_LIKE_KM,
            max_radius_km: DEFAULT_MAX_RADIUS_KM,
            coalition_bonus: DEFAULT_COALITION_BONUS,
            local_radius_km: DEFAULT_LOCAL_RADIUS_KM,
            simplify_tolerance_deg: DEFAULT_SIMPLIFY_TOLERANCE_DEG,
            smoothing_iterations: DEFAULT_SMOOTHING_ITERATIONS,
        }
    }
}
