use serde::{Deserialize, Serialize};

/// A `[lon, lat]` pair.
pub type Position = [f64; 2];

/// Closed sequence of positions; the first and last entries are identical.
pub type Ring = Vec<Position>;

/// Exterior ring first, holes after it.
pub type PolygonRings = Vec<Ring>;

/// GeoJSON-shaped polygonal geometry in (lon, lat) space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

impl Geometry {
    /// Wrap a list of polygons, collapsing the single-part case to `Polygon`.
    /// Returns `None` when there are no parts.
    pub fn from_parts(mut parts: Vec<PolygonRings>) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop().map(Geometry::Polygon),
            _ => Some(Geometry::MultiPolygon(parts)),
        }
    }

    pub fn parts(&self) -> Vec<&PolygonRings> {
        match self {
            Geometry::Polygon(rings) => vec![rings],
            Geometry::MultiPolygon(parts) => parts.iter().collect(),
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Polygon(_) => 1,
            Geometry::MultiPolygon(parts) => parts.len(),
        }
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.parts().into_iter().flat_map(|rings| rings.iter())
    }

    /// Apply `f` to every ring of every part, holes included.
    pub fn map_rings(self, mut f: impl FnMut(Ring) -> Ring) -> Self {
        match self {
            Geometry::Polygon(rings) => Geometry::Polygon(rings.into_iter().map(&mut f).collect()),
            Geometry::MultiPolygon(parts) => Geometry::MultiPolygon(
                parts
                    .into_iter()
                    .map(|rings| rings.into_iter().map(&mut f).collect())
                    .collect(),
            ),
        }
    }

    /// `(min_lon, min_lat, max_lon, max_lat)` over all rings.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for [lon, lat] in self.rings().flatten().copied() {
            bounds = Some(match bounds {
                None => (lon, lat, lon, lat),
                Some((min_lon, min_lat, max_lon, max_lat)) => (
                    min_lon.min(lon),
                    min_lat.min(lat),
                    max_lon.max(lon),
                    max_lat.max(lat),
                ),
            });
        }
        bounds
    }
}

/// Shoelace signed area in squared coordinate units; counter-clockwise is positive.
pub fn ring_signed_area(ring: &[Position]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for window in ring.windows(2) {
        let [x0, y0] = window[0];
        let [x1, y1] = window[1];
        twice_area += x0 * y1 - x1 * y0;
    }
    // Tolerate open rings.
    if ring.first() != ring.last() {
        let [x0, y0] = ring[ring.len() - 1];
        let [x1, y1] = ring[0];
        twice_area += x0 * y1 - x1 * y0;
    }
    twice_area / 2.0
}

pub fn ring_is_closed(ring: &[Position]) -> bool {
    ring.len() >= 4 && ring.first() == ring.last()
}
