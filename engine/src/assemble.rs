use std::collections::BTreeMap;

use claimmap_shared::{Geometry, PolygonRings, Position, Ring, TerritoryFeature};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::grid::{FactionIdx, GridResult};
use crate::lattice::{EdgeSet, LatticeRing};
use crate::regions::Block;
use crate::smooth::smooth;

#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub geometry: Option<Geometry>,
    /// Pairwise unions that failed and kept their left operand.
    pub union_fallbacks: usize,
}

/// Union blocks by merging neighbouring pairs each round until one shape
/// remains. A failed pair keeps its left operand and the round carries on.
pub fn binary_merge(shapes: Vec<EdgeSet>) -> (Option<EdgeSet>, usize) {
    let mut layer = shapes;
    let mut fallbacks = 0;

    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut iter = layer.into_iter();
        while let Some(left) = iter.next() {
            let Some(right) = iter.next() else {
                next.push(left);
                break;
            };
            match left.union(&right) {
                Ok(merged) => next.push(merged),
                Err(e) => {
                    warn!(error = %e, "pairwise union failed, keeping left operand");
                    fallbacks += 1;
                    next.push(left);
                }
            }
        }
        layer = next;
    }

    (layer.pop(), fallbacks)
}

/// Maps lattice vertices back to (lon, lat). Cell centres sit on the grid
/// origin, so cell boundaries are half a step away on each side.
fn lattice_to_ring(ring: &LatticeRing, grid: &GridResult) -> Ring {
    let mut out: Ring = ring
        .iter()
        .map(|&(x, y)| -> Position {
            [
                grid.origin[0] + (x as f64 - 0.5) * grid.step,
                grid.origin[1] + (y as f64 - 0.5) * grid.step,
            ]
        })
        .collect();
    if let Some(&first) = out.first() {
        out.push(first);
    }
    out
}

/// Union a faction's blocks into one (multi)polygon in (lon, lat) space,
/// unsmoothed.
pub fn assemble(blocks: &[Block], grid: &GridResult) -> Assembly {
    let shapes: Vec<EdgeSet> = blocks.iter().map(EdgeSet::from_block).collect();
    let (merged, union_fallbacks) = binary_merge(shapes);

    let polygons = match merged.as_ref().map(EdgeSet::polygons) {
        None => Vec::new(),
        Some(Ok(polygons)) => polygons,
        Some(Err(e)) => {
            warn!(error = %e, "failed to trace merged boundary");
            Vec::new()
        }
    };

    let parts: Vec<PolygonRings> = polygons
        .iter()
        .map(|polygon| {
            std::iter::once(&polygon.exterior)
                .chain(polygon.holes.iter())
                .map(|ring| lattice_to_ring(ring, grid))
                .collect()
        })
        .collect();

    Assembly {
        geometry: Geometry::from_parts(parts),
        union_fallbacks,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssemblyReport {
    pub territories: Vec<TerritoryFeature>,
    pub union_fallbacks: usize,
}

/// Assemble and smooth every faction that has blocks, in faction-id order.
pub fn build_territories(
    grid: &GridResult,
    blocks: &BTreeMap<FactionIdx, Vec<Block>>,
    config: &EngineConfig,
) -> AssemblyReport {
    let mut report = AssemblyReport::default();

    for (&faction, faction_blocks) in blocks {
        let Some(meta) = grid.factions.get(faction) else {
            continue;
        };
        let assembly = assemble(faction_blocks, grid);
        report.union_fallbacks += assembly.union_fallbacks;
        let Some(geometry) = assembly.geometry else {
            debug!(faction = %meta.id, "faction produced no geometry");
            continue;
        };

        report.territories.push(TerritoryFeature {
            faction_id: meta.id.clone(),
            color: meta.color.clone(),
            total_likes: meta.total_likes,
            geometry: smooth(geometry, config),
        });
    }

    report
}
