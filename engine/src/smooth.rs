use claimmap_shared::{Geometry, Position, Ring};

use crate::config::EngineConfig;

fn open_ring(ring: &[Position]) -> Vec<Position> {
    let mut open = ring.to_vec();
    if open.len() > 1 && open.first() == open.last() {
        open.pop();
    }
    open
}

fn close_ring(mut open: Vec<Position>) -> Ring {
    if let Some(&first) = open.first() {
        open.push(first);
    }
    open
}

/// Distance from `p` to the infinite line through `a` and `b`.
fn distance_to_line(p: Position, a: Position, b: Position) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return (p[0] - a[0]).hypot(p[1] - a[1]);
    }
    ((p[0] - a[0]) * dy - (p[1] - a[1]) * dx).abs() / len
}

/// Drop vertices lying within `tolerance` of the line through their
/// neighbours. Never reduces a ring below a triangle.
pub fn simplify_ring(ring: &[Position], tolerance: f64) -> Ring {
    let mut points = open_ring(ring);
    loop {
        let n = points.len();
        if n <= 3 {
            break;
        }
        let Some(i) = (0..n).find(|&i| {
            distance_to_line(points[i], points[(i + n - 1) % n], points[(i + 1) % n]) <= tolerance
        }) else {
            break;
        };
        points.remove(i);
    }
    close_ring(points)
}

/// Chaikin corner cutting: every edge `p -> q` becomes the two points at 1/4
/// and 3/4 along it.
pub fn chaikin_ring(ring: &[Position], iterations: u32) -> Ring {
    let mut points = open_ring(ring);
    if points.len() < 3 {
        return close_ring(points);
    }
    for _ in 0..iterations {
        let n = points.len();
        let mut next = Vec::with_capacity(n * 2);
        for i in 0..n {
            let p = points[i];
            let q = points[(i + 1) % n];
            next.push([0.75 * p[0] + 0.25 * q[0], 0.75 * p[1] + 0.25 * q[1]]);
            next.push([0.25 * p[0] + 0.75 * q[0], 0.25 * p[1] + 0.75 * q[1]]);
        }
        points = next;
    }
    close_ring(points)
}

pub fn smooth_ring(ring: &[Position], config: &EngineConfig) -> Ring {
    let simplified = simplify_ring(ring, config.simplify_tolerance_deg);
    chaikin_ring(&simplified, config.smoothing_iterations)
}

/// Simplify and round every ring of every part; holes are treated like
/// exteriors.
pub fn smooth(geometry: Geometry, config: &EngineConfig) -> Geometry {
    geometry.map_rings(|ring| smooth_ring(&ring, config))
}
