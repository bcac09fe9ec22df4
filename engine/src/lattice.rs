//! Rectilinear shapes on the integer lattice of grid-cell boundaries.
//!
//! Cell `(row, col)` spans `x in [col, col + 1]`, `y in [row, row + 1]`. A
//! shape is stored as the set of its directed unit boundary edges with the
//! interior on the left, so exteriors run counter-clockwise and holes
//! clockwise.
//!
//! Traced rings never revisit a vertex. Two shapes meeting at a single
//! corner become two rings, and so does a hole that touches its exterior at
//! a single corner; the shared corner then appears once in each ring.

use std::collections::{BTreeMap, BTreeSet};

use crate::regions::Block;

pub type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub from: Vertex,
    pub to: Vertex,
}

impl Edge {
    fn new(from: Vertex, to: Vertex) -> Self {
        Self { from, to }
    }

    fn reversed(self) -> Self {
        Self::new(self.to, self.from)
    }

    fn direction(&self) -> (i64, i64) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    edges: BTreeSet<Edge>,
}

/// Closed lattice ring without the repeated closing vertex; corners only.
pub type LatticeRing = Vec<Vertex>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticePolygon {
    pub exterior: LatticeRing,
    pub holes: Vec<LatticeRing>,
}

impl EdgeSet {
    pub fn rectangle(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        let mut edges = BTreeSet::new();
        for x in x0..x1 {
            edges.insert(Edge::new((x, y0), (x + 1, y0)));
            edges.insert(Edge::new((x + 1, y1), (x, y1)));
        }
        for y in y0..y1 {
            edges.insert(Edge::new((x1, y), (x1, y + 1)));
            edges.insert(Edge::new((x0, y + 1), (x0, y)));
        }
        Self { edges }
    }

    /// Boundary of a block's cells.
    pub fn from_block(block: &Block) -> Self {
        Self::rectangle(
            block.start_col,
            block.start_row,
            block.end_col + 1,
            block.end_row + 1,
        )
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Union of two shapes with disjoint interiors. Boundary shared by both
    /// cancels out. Fails without touching either operand if both claim the
    /// same edge in the same direction, which means their interiors overlap.
    pub fn union(&self, other: &EdgeSet) -> Result<EdgeSet, String> {
        if let Some(edge) = other.edges.iter().find(|edge| self.edges.contains(*edge)) {
            return Err(format!(
                "overlapping boundary edge {:?} -> {:?}",
                edge.from, edge.to
            ));
        }

        let mut merged = self.edges.clone();
        for edge in &other.edges {
            if !merged.remove(&edge.reversed()) {
                merged.insert(*edge);
            }
        }
        Ok(EdgeSet { edges: merged })
    }

    /// Trace closed rings out of the edge set. At pinch vertices the tightest
    /// left turn is taken so shapes touching at a corner stay separate rings;
    /// a walk that still comes back to a vertex is split there.
    pub fn rings(&self) -> Result<Vec<LatticeRing>, String> {
        let mut outgoing: BTreeMap<Vertex, Vec<Edge>> = BTreeMap::new();
        for edge in &self.edges {
            outgoing.entry(edge.from).or_default().push(*edge);
        }

        let mut visited: BTreeSet<Edge> = BTreeSet::new();
        let mut rings = Vec::new();

        for &start in &self.edges {
            if visited.contains(&start) {
                continue;
            }
            let mut ring: LatticeRing = Vec::new();
            let mut edge = start;
            loop {
                if !visited.insert(edge) {
                    return Err(format!("edge {:?} -> {:?} traced twice", edge.from, edge.to));
                }
                ring.push(edge.from);
                let next = next_edge(&outgoing, edge).ok_or_else(|| {
                    format!("open boundary at {:?}", edge.to)
                })?;
                if next == start {
                    break;
                }
                edge = next;
            }
            rings.extend(split_at_pinches(ring).into_iter().map(drop_collinear));
        }
        Ok(rings)
    }

    /// Split traced rings into polygons: counter-clockwise rings are exteriors,
    /// clockwise rings are holes attached to the smallest exterior around them.
    pub fn polygons(&self) -> Result<Vec<LatticePolygon>, String> {
        let mut polygons: Vec<LatticePolygon> = Vec::new();
        let mut areas: Vec<i64> = Vec::new();
        let mut holes: Vec<LatticeRing> = Vec::new();

        for ring in self.rings()? {
            let area = twice_signed_area(&ring);
            if area > 0 {
                areas.push(area);
                polygons.push(LatticePolygon {
                    exterior: ring,
                    holes: Vec::new(),
                });
            } else if area < 0 {
                holes.push(ring);
            }
        }

        for hole in holes {
            let inside = interior_point(&hole);
            let owner = polygons
                .iter()
                .enumerate()
                .filter(|(_, polygon)| contains(&polygon.exterior, inside))
                .min_by_key(|&(idx, _)| areas[idx])
                .map(|(idx, _)| idx);
            match owner {
                Some(idx) => polygons[idx].holes.push(hole),
                None => return Err(format!("hole at {:?} has no enclosing ring", hole[0])),
            }
        }
        Ok(polygons)
    }
}

/// Candidate turns in preference order: left, straight, right.
fn next_edge(outgoing: &BTreeMap<Vertex, Vec<Edge>>, incoming: Edge) -> Option<Edge> {
    let candidates = outgoing.get(&incoming.to)?;
    let (dx, dy) = incoming.direction();
    let preferred = [(-dy, dx), (dx, dy), (dy, -dx)];
    preferred.iter().find_map(|&direction| {
        candidates
            .iter()
            .copied()
            .find(|candidate| candidate.direction() == direction)
    })
}

/// Cut a closed vertex walk into simple loops at every revisited vertex.
fn split_at_pinches(walk: Vec<Vertex>) -> Vec<LatticeRing> {
    let mut loops = Vec::new();
    let mut path: LatticeRing = Vec::with_capacity(walk.len());
    let mut seen: BTreeMap<Vertex, usize> = BTreeMap::new();

    for vertex in walk {
        match seen.get(&vertex) {
            Some(&at) => {
                let closed = path.split_off(at);
                for popped in &closed[1..] {
                    seen.remove(popped);
                }
                loops.push(closed);
                path.push(vertex);
            }
            None => {
                seen.insert(vertex, path.len());
                path.push(vertex);
            }
        }
    }
    if !path.is_empty() {
        loops.push(path);
    }
    loops
}

fn drop_collinear(ring: LatticeRing) -> LatticeRing {
    let n = ring.len();
    if n < 3 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let cross = (cur.0 - prev.0) * (next.1 - cur.1) - (cur.1 - prev.1) * (next.0 - cur.0);
            cross != 0
        })
        .map(|i| ring[i])
        .collect()
}

pub fn twice_signed_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// A point just left of the ring's first edge midpoint. Its coordinates are
/// never integers, so it never sits on a lattice boundary.
fn interior_point(ring: &[Vertex]) -> (f64, f64) {
    let from = ring[0];
    let to = ring[1 % ring.len()];
    let len = ((to.0 - from.0).abs() + (to.1 - from.1).abs()).max(1) as f64;
    let (dx, dy) = (
        (to.0 - from.0) as f64 / len,
        (to.1 - from.1) as f64 / len,
    );
    (
        from.0 as f64 + dx * 0.5 - dy * 0.25,
        from.1 as f64 + dy * 0.5 + dx * 0.25,
    )
}

/// Even-odd point-in-ring test.
fn contains(ring: &[Vertex], (px, py): (f64, f64)) -> bool {
    let n = ring.len();
    let mut inside = false;
    for i in 0..n {
        let (x0, y0) = (ring[i].0 as f64, ring[i].1 as f64);
        let (x1, y1) = (ring[(i + 1) % n].0 as f64, ring[(i + 1) % n].1 as f64);
        if (y0 > py) != (y1 > py) && px < x0 + (py - y0) / (y1 - y0) * (x1 - x0) {
            inside = !inside;
        }
    }
    inside
}
