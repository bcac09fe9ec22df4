use std::collections::{BTreeMap, HashMap};

use claimmap_shared::Position;
use claimmap_shared::colors::display_color;

use crate::config::EngineConfig;
use crate::force::WeightedPoint;
use crate::geo::{KM_PER_DEGREE_LAT, km_per_degree_lon, planar_distance_km};

/// Index into [`GridResult::factions`].
pub type FactionIdx = usize;

/// Sparse `row -> col -> winner` map, rows and columns in ascending order.
pub type WinnerMap = BTreeMap<i64, BTreeMap<i64, FactionIdx>>;

#[derive(Debug, Clone, PartialEq)]
pub struct FactionMeta {
    pub id: String,
    pub color: String,
    pub total_likes: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridResult {
    /// `[lon, lat]` of the centre of cell (0, 0).
    pub origin: Position,
    pub step: f64,
    /// Sorted by faction id; a [`FactionIdx`] is a position in this list.
    pub factions: Vec<FactionMeta>,
    pub winners: WinnerMap,
}

impl GridResult {
    pub fn cell_center(&self, row: i64, col: i64) -> Position {
        cell_center(self.origin, self.step, row, col)
    }

    pub fn winner_at(&self, row: i64, col: i64) -> Option<FactionIdx> {
        self.winners.get(&row)?.get(&col).copied()
    }

    pub fn cell_count(&self) -> usize {
        self.winners.values().map(BTreeMap::len).sum()
    }

    /// Number of cells won by the given faction id.
    pub fn cells_won_by(&self, faction_id: &str) -> usize {
        let Some(idx) = self.factions.iter().position(|meta| meta.id == faction_id) else {
            return 0;
        };
        self.winners
            .values()
            .flat_map(BTreeMap::values)
            .filter(|&&winner| winner == idx)
            .count()
    }
}

fn cell_center(origin: Position, step: f64, row: i64, col: i64) -> Position {
    [
        origin[0] + col as f64 * step,
        origin[1] + row as f64 * step,
    ]
}

/// Per-cell running totals, one entry per faction that reached the cell.
#[derive(Debug, Default)]
struct CellTotals(Vec<(FactionIdx, f64)>);

impl CellTotals {
    fn add(&mut self, faction: FactionIdx, influence: f64) {
        match self.0.iter_mut().find(|(idx, _)| *idx == faction) {
            Some((_, total)) => *total += influence,
            None => self.0.push((faction, influence)),
        }
    }

    /// Strictly greatest positive total; equal totals go to the faction with
    /// the lexicographically smallest id (factions are indexed in id order).
    fn winner(&self) -> Option<FactionIdx> {
        let mut best: Option<(FactionIdx, f64)> = None;
        for &(faction, total) in &self.0 {
            if total <= 0.0 {
                continue;
            }
            best = match best {
                Some((best_faction, best_total))
                    if total < best_total || (total == best_total && faction > best_faction) =>
                {
                    Some((best_faction, best_total))
                }
                _ => Some((faction, total)),
            };
        }
        best.map(|(faction, _)| faction)
    }
}

fn collect_factions(points: &[WeightedPoint]) -> Vec<FactionMeta> {
    let mut by_id: BTreeMap<&str, (String, i64)> = BTreeMap::new();
    for point in points {
        let entry = by_id
            .entry(point.faction_id.as_str())
            .or_insert_with(|| (String::new(), 0));
        if entry.0.is_empty() && !point.color.trim().is_empty() {
            entry.0 = point.color.clone();
        }
        entry.1 += point.likes;
    }

    by_id
        .into_iter()
        .map(|(id, (color, total_likes))| FactionMeta {
            id: id.to_string(),
            color: display_color(&color, id),
            total_likes,
        })
        .collect()
}

/// Rasterize every point's linear-falloff influence onto the grid and resolve
/// one winner per reached cell.
pub fn rasterize(points: &[WeightedPoint], config: &EngineConfig) -> GridResult {
    let step = config.grid_step_deg;
    let factions = collect_factions(points);
    let origin = points
        .iter()
        .map(|point| point.position)
        .reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1])])
        .unwrap_or([0.0, 0.0]);

    let faction_index: HashMap<&str, FactionIdx> = factions
        .iter()
        .enumerate()
        .map(|(idx, meta)| (meta.id.as_str(), idx))
        .collect();

    let mut totals: HashMap<(i64, i64), CellTotals> = HashMap::new();
    let km_per_row = KM_PER_DEGREE_LAT * step;

    for point in points {
        let Some(&faction) = faction_index.get(point.faction_id.as_str()) else {
            continue;
        };
        let radius = point.influence_radius_km;
        if radius <= 0.0 {
            continue;
        }

        let [lon, lat] = point.position;
        let center_row = ((lat - origin[1]) / step).round() as i64;
        let center_col = ((lon - origin[0]) / step).round() as i64;
        let km_per_col = km_per_degree_lon(lat) * step;
        let row_reach = (radius / km_per_row).ceil() as i64;
        let col_reach = (radius / km_per_col).ceil() as i64;

        for row in center_row - row_reach..=center_row + row_reach {
            for col in center_col - col_reach..=center_col + col_reach {
                let distance = planar_distance_km(point.position, cell_center(origin, step, row, col));
                if distance >= radius {
                    continue;
                }
                let influence = (radius - distance) / radius * point.effective_force;
                totals.entry((row, col)).or_default().add(faction, influence);
            }
        }
    }

    let mut winners = WinnerMap::new();
    for ((row, col), cell) in &totals {
        if let Some(winner) = cell.winner() {
            winners.entry(*row).or_default().insert(*col, winner);
        }
    }

    GridResult {
        origin,
        step,
        factions,
        winners,
    }
}
