use std::time::Instant;

use claimmap_shared::{EngineMessage, EngineRequest, PointClaim, Position, TerritoryFeature};
use tracing::{debug, info};

use crate::assemble::build_territories;
use crate::config::EngineConfig;
use crate::force::compute_forces;
use crate::geo::planar_distance_km;
use crate::grid::rasterize;
use crate::regions::extract_blocks;

pub const PHASE_SPLIT: &str = "split";
pub const PHASE_LOCAL_FORCES: &str = "local forces";
pub const PHASE_LOCAL_GRID: &str = "local grid";
pub const PHASE_LOCAL_TERRITORIES: &str = "local territories";
pub const PHASE_GLOBAL_FORCES: &str = "global forces";
pub const PHASE_GLOBAL_GRID: &str = "global grid";
pub const PHASE_GLOBAL_TERRITORIES: &str = "global territories";
pub const PHASE_COMPLETE: &str = "complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Idle,
    Splitting,
    LocalPass,
    LocalEmitted,
    GlobalPass,
    Done,
}

/// Progress labels and percentages for one pass.
struct PassPhases {
    forces: (&'static str, u8),
    grid: (&'static str, u8),
    territories: (&'static str, u8),
}

const LOCAL_PHASES: PassPhases = PassPhases {
    forces: (PHASE_LOCAL_FORCES, 15),
    grid: (PHASE_LOCAL_GRID, 30),
    territories: (PHASE_LOCAL_TERRITORIES, 45),
};

const GLOBAL_PHASES: PassPhases = PassPhases {
    forces: (PHASE_GLOBAL_FORCES, 60),
    grid: (PHASE_GLOBAL_GRID, 80),
    territories: (PHASE_GLOBAL_TERRITORIES, 95),
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    pub territories: Vec<TerritoryFeature>,
    pub point_count: usize,
    pub cell_count: usize,
    pub block_count: usize,
    pub union_fallbacks: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub local_points: usize,
    pub distant_points: usize,
    pub union_fallbacks: usize,
    pub messages_emitted: usize,
}

/// Indices of points within `radius_km` of `focus`, and of the rest.
pub fn split_points(
    points: &[PointClaim],
    focus: Position,
    radius_km: f64,
) -> (Vec<usize>, Vec<usize>) {
    (0..points.len()).partition(|&i| planar_distance_km(points[i].coordinates, focus) <= radius_km)
}

/// Drives the local-then-global pipeline for one request at a time. Holds
/// only configuration; all working state lives inside [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: EngineConfig,
}

/// Tracks the current state and forwards tagged messages to the caller.
struct Run<'a> {
    generation: u64,
    state: RunState,
    emit: &'a mut dyn FnMut(EngineMessage),
    messages_emitted: usize,
}

impl Run<'_> {
    fn enter(&mut self, next: RunState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        debug!(generation = self.generation, from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn send(&mut self, message: EngineMessage) {
        self.messages_emitted += 1;
        (self.emit)(message);
    }

    fn progress(&mut self, (phase, percent): (&'static str, u8)) {
        self.send(EngineMessage::Progress {
            generation: self.generation,
            phase: phase.to_string(),
            percent,
        });
    }

    fn territories(&mut self, partial: bool, territories: Vec<TerritoryFeature>) {
        self.send(EngineMessage::Territories {
            generation: self.generation,
            partial,
            territories,
        });
    }
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Forces, grid, blocks and territories over `points`, reporting progress
    /// after each stage.
    fn pass(&self, points: &[PointClaim], phases: &PassPhases, run: &mut Run<'_>) -> PassOutcome {
        let weighted = compute_forces(points, &self.config);
        run.progress(phases.forces);

        let grid = rasterize(&weighted, &self.config);
        run.progress(phases.grid);

        let blocks = extract_blocks(&grid);
        let report = build_territories(&grid, &blocks, &self.config);
        run.progress(phases.territories);

        let outcome = PassOutcome {
            territories: report.territories,
            point_count: points.len(),
            cell_count: grid.cell_count(),
            block_count: blocks.values().map(Vec::len).sum(),
            union_fallbacks: report.union_fallbacks,
        };
        debug!(
            generation = run.generation,
            points = outcome.point_count,
            cells = outcome.cell_count,
            blocks = outcome.block_count,
            territories = outcome.territories.len(),
            "territory pass finished"
        );
        outcome
    }

    /// Compute territories for one request. Emits progress, exactly one
    /// partial result (local points only) and then exactly one final result
    /// (all points), all tagged with `generation`.
    pub fn run(
        &self,
        request: &EngineRequest,
        generation: u64,
        emit: &mut dyn FnMut(EngineMessage),
    ) -> RunSummary {
        let started = Instant::now();
        let mut run = Run {
            generation,
            state: RunState::Idle,
            emit,
            messages_emitted: 0,
        };

        run.enter(RunState::Splitting);
        let (local_idx, distant_idx) =
            split_points(&request.points, request.focus, self.config.local_radius_km);
        let local: Vec<PointClaim> = local_idx
            .iter()
            .map(|&i| request.points[i].clone())
            .collect();
        run.progress((PHASE_SPLIT, 5));

        run.enter(RunState::LocalPass);
        let local_outcome = self.pass(&local, &LOCAL_PHASES, &mut run);
        let mut union_fallbacks = local_outcome.union_fallbacks;

        run.enter(RunState::LocalEmitted);
        if distant_idx.is_empty() {
            run.territories(true, local_outcome.territories.clone());
            run.enter(RunState::GlobalPass);
            run.progress((PHASE_COMPLETE, 100));
            run.territories(false, local_outcome.territories);
        } else {
            run.territories(true, local_outcome.territories);
            run.enter(RunState::GlobalPass);
            let global_outcome = self.pass(&request.points, &GLOBAL_PHASES, &mut run);
            union_fallbacks += global_outcome.union_fallbacks;
            run.progress((PHASE_COMPLETE, 100));
            run.territories(false, global_outcome.territories);
        }
        run.enter(RunState::Done);

        let summary = RunSummary {
            local_points: local_idx.len(),
            distant_points: distant_idx.len(),
            union_fallbacks,
            messages_emitted: run.messages_emitted,
        };
        info!(
            generation,
            local_points = summary.local_points,
            distant_points = summary.distant_points,
            union_fallbacks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "territory run complete"
        );
        summary
    }

    /// Run to completion and collect every emitted message.
    pub fn run_collect(&self, request: &EngineRequest, generation: u64) -> Vec<EngineMessage> {
        let mut messages = Vec::new();
        self.run(request, generation, &mut |message| messages.push(message));
        messages
    }
}

#[cfg(test)]
mod tests {
    use claimmap_shared::{Geometry, ring_is_closed};

    use super::*;
    use crate::force::influence_radius_km;

    fn claim(faction: &str, lon: f64, lat: f64, likes: i64) -> PointClaim {
        PointClaim {
            coordinates: [lon, lat],
            faction_id: faction.to_string(),
            color: String::new(),
            likes,
        }
    }

    fn request(points: Vec<PointClaim>, focus: Position) -> EngineRequest {
        EngineRequest { points, focus }
    }

    fn territory_messages(messages: &[EngineMessage]) -> Vec<(bool, &Vec<TerritoryFeature>)> {
        messages
            .iter()
            .filter_map(|message| match message {
                EngineMessage::Territories {
                    partial,
                    territories,
                    ..
                } => Some((*partial, territories)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_input_emits_empty_partial_then_final() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let messages = orchestrator.run_collect(&request(Vec::new(), [0.0, 0.0]), 1);
        let results = territory_messages(&messages);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], (true, &Vec::new()));
        assert_eq!(results[1], (false, &Vec::new()));
        assert!(messages.last().is_some_and(EngineMessage::is_final));
    }

    #[test]
    fn partial_always_precedes_final_and_progress_is_monotonic() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let points = vec![claim("red", 0.0, 0.0, 5), claim("blue", 3.0, 0.0, 5)];
        let messages = orchestrator.run_collect(&request(points, [0.0, 0.0]), 7);

        assert!(messages.iter().all(|m| m.generation() == 7));
        let results = territory_messages(&messages);
        assert_eq!(results.iter().map(|(p, _)| *p).collect::<Vec<_>>(), vec![true, false]);

        let percents: Vec<u8> = messages
            .iter()
            .filter_map(|m| match m {
                EngineMessage::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]), "{percents:?}");
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn local_pass_only_sees_points_near_focus() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let points = vec![claim("red", 0.0, 0.0, 5), claim("blue", 3.0, 0.0, 5)];
        let messages = orchestrator.run_collect(&request(points, [0.0, 0.0]), 1);
        let results = territory_messages(&messages);

        let partial_ids: Vec<&str> = results[0].1.iter().map(|t| t.faction_id.as_str()).collect();
        let final_ids: Vec<&str> = results[1].1.iter().map(|t| t.faction_id.as_str()).collect();
        assert_eq!(partial_ids, vec!["red"]);
        assert_eq!(final_ids, vec!["blue", "red"]);
    }

    #[test]
    fn split_uses_configured_radius() {
        let points = vec![
            claim("a", 0.0, 0.0, 0),
            claim("b", 0.1, 0.0, 0),
            claim("c", 0.3, 0.0, 0),
        ];
        // 0.1 deg ~ 11 km, 0.3 deg ~ 33 km at the equator.
        assert_eq!(split_points(&points, [0.0, 0.0], 25.0), (vec![0, 1], vec![2]));
        assert_eq!(split_points(&points, [0.0, 0.0], 5.0), (vec![0], vec![1, 2]));
    }

    #[test]
    fn all_local_final_repeats_partial() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let points = vec![claim("red", 0.0, 0.0, 5)];
        let messages = orchestrator.run_collect(&request(points, [0.0, 0.0]), 1);
        let results = territory_messages(&messages);
        assert_eq!(results[0].1, results[1].1);
        assert!(
            !messages
                .iter()
                .any(|m| matches!(m, EngineMessage::Progress { phase, .. } if phase == PHASE_GLOBAL_GRID))
        );
    }

    #[test]
    fn single_point_yields_compact_disc_of_its_radius() {
        let config = EngineConfig::default();
        let orchestrator = Orchestrator::new(config);
        let messages = orchestrator.run_collect(&request(vec![claim("a", 2.0, 45.0, 0)], [2.0, 45.0]), 1);
        let results = territory_messages(&messages);
        let territories = results[1].1;
        assert_eq!(territories.len(), 1);

        let Geometry::Polygon(rings) = &territories[0].geometry else {
            panic!("expected a single polygon");
        };
        assert_eq!(rings.len(), 1);
        assert!(ring_is_closed(&rings[0]));

        assert_reach(&territories[0].geometry, [2.0, 45.0], influence_radius_km(0, &config), &config);
    }

    /// The farthest vertex sits about one influence radius from `center`.
    fn assert_reach(geometry: &Geometry, center: Position, radius: f64, config: &EngineConfig) {
        let cell_km = config.grid_step_deg * crate::geo::KM_PER_DEGREE_LAT;
        let max_distance = geometry
            .rings()
            .flat_map(|ring| ring.iter())
            .map(|&p| planar_distance_km(p, center))
            .fold(0.0, f64::max);
        assert!(max_distance <= radius + cell_km, "{max_distance} vs {radius}");
        assert!(max_distance >= radius - 2.0 * cell_km, "{max_distance} vs {radius}");
    }

    #[test]
    fn overlapping_allies_merge_into_one_polygon() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        // 1.5 km radii, 2 km apart.
        let points = vec![claim("red", 0.0, 0.0, 10), claim("red", 0.018, 0.0, 10)];
        let messages = orchestrator.run_collect(&request(points, [0.0, 0.0]), 1);
        let territories = territory_messages(&messages)[1].1;
        assert_eq!(territories.len(), 1);
        assert!(matches!(territories[0].geometry, Geometry::Polygon(_)));
        assert_eq!(territories[0].total_likes, 20);
    }

    #[test]
    fn distant_rivals_produce_disjoint_polygons() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let points = vec![claim("red", 0.0, 0.0, 10), claim("blue", 0.2, 0.0, 10)];
        let messages = orchestrator.run_collect(&request(points, [0.1, 0.0]), 1);
        let territories = territory_messages(&messages)[1].1;
        assert_eq!(territories.len(), 2);

        let bounds: Vec<_> = territories
            .iter()
            .map(|t| t.geometry.bounds().expect("bounds"))
            .collect();
        assert!(territories.iter().all(|t| t.geometry.part_count() == 1));
        // blue sits east of red with a wide gap.
        assert!(bounds[0].0 > bounds[1].2 + 0.1);

        let config = EngineConfig::default();
        let radius = influence_radius_km(10, &config);
        for territory in territories {
            let center = if territory.faction_id == "red" { [0.0, 0.0] } else { [0.2, 0.0] };
            assert_reach(&territory.geometry, center, radius, &config);
        }
    }

    #[test]
    fn identical_requests_produce_identical_output() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let points = vec![
            claim("red", 0.0, 0.0, 12),
            claim("blue", 0.015, 0.003, 8),
            claim("red", 0.01, -0.01, 3),
            claim("green", 0.5, 0.5, 30),
        ];
        let req = request(points, [0.0, 0.0]);
        assert_eq!(orchestrator.run_collect(&req, 4), orchestrator.run_collect(&req, 4));
    }

    #[test]
    fn summary_counts_emitted_messages() {
        let orchestrator = Orchestrator::new(EngineConfig::default());
        let mut count = 0;
        let summary = orchestrator.run(
            &request(vec![claim("red", 0.0, 0.0, 1), claim("red", 9.0, 9.0, 1)], [0.0, 0.0]),
            2,
            &mut |_| count += 1,
        );
        assert_eq!(summary.messages_emitted, count);
        assert_eq!((summary.local_points, summary.distant_points), (1, 1));
        assert_eq!(summary.union_fallbacks, 0);
    }
}
