use claimmap_shared::{PointClaim, Position};

use crate::config::EngineConfig;
use crate::geo::planar_distance_km;

/// A [`PointClaim`] enriched with its derived reach and strength.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPoint {
    pub position: Position,
    pub faction_id: String,
    pub color: String,
    pub likes: i64,
    pub influence_radius_km: f64,
    pub effective_force: f64,
    /// Same-faction points whose reach overlaps this one.
    pub allies: usize,
}

/// Popularity floor: every point counts as at least one like.
pub fn base_force(likes: i64) -> f64 {
    likes.max(1) as f64
}

/// `min(BASE + PER_LIKE * max(1, likes), MAX)`.
pub fn influence_radius_km(likes: i64, config: &EngineConfig) -> f64 {
    (config.base_radius_km + config.per_like_km * base_force(likes)).min(config.max_radius_km)
}

/// Derive radius and effective force for every point, including the coalition
/// bonus for overlapping allies. Output order matches input order.
pub fn compute_forces(points: &[PointClaim], config: &EngineConfig) -> Vec<WeightedPoint> {
    let radii: Vec<f64> = points
        .iter()
        .map(|point| influence_radius_km(point.likes, config))
        .collect();

    points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let allies = points
                .iter()
                .enumerate()
                .filter(|&(j, other)| {
                    j != i
                        && other.faction_id == point.faction_id
                        && planar_distance_km(point.coordinates, other.coordinates)
                            <= radii[i] + radii[j]
                })
                .count();

            WeightedPoint {
                position: point.coordinates,
                faction_id: point.faction_id.clone(),
                color: point.color.clone(),
                likes: point.likes,
                influence_radius_km: radii[i],
                effective_force: base_force(point.likes) + allies as f64 * config.coalition_bonus,
                allies,
            }
        })
        .collect()
}
