use anyhow::Result;
use gtfs::LatLon;

use crate::Waypoint;

/// How a vehicle gets from one waypoint to the next. Sampling times never depend on this; only
/// the position reported at each sample does.
pub enum PathSource<'a> {
    /// Straight segments between consecutive stops
    NoShapeAvailable,
    /// Follow a shape. `offsets` holds each waypoint's distance along the shape, non-decreasing,
    /// one per waypoint.
    ShapeAvailable {
        shape: &'a Polyline,
        offsets: Vec<f64>,
    },
}

impl<'a> PathSource<'a> {
    /// Tries to place each waypoint along the shape, in order. None if the stops can't be
    /// matched up with the shape going forwards.
    pub fn along_shape(shape: &'a Polyline, waypoints: &[Waypoint]) -> Option<Self> {
        let mut offsets = Vec::with_capacity(waypoints.len());
        let mut min_dist = 0.0;
        for (idx, waypoint) in waypoints.iter().enumerate() {
            let dist = shape.project_from(waypoint.pos, min_dist)?;
            // Distinct stops have to make progress along the shape
            if idx > 0 && dist <= min_dist && waypoints[idx - 1].pos != waypoint.pos {
                return None;
            }
            offsets.push(dist);
            min_dist = dist;
        }
        Some(Self::ShapeAvailable { shape, offsets })
    }

    /// The position `fraction` (in [0, 1]) of the way from waypoint `idx` to `idx + 1`.
    pub fn position(&self, waypoints: &[Waypoint], idx: usize, fraction: f64) -> LatLon {
        match self {
            Self::NoShapeAvailable => waypoints[idx].pos.lerp(waypoints[idx + 1].pos, fraction),
            Self::ShapeAvailable { shape, offsets } => {
                let (d1, d2) = (offsets[idx], offsets[idx + 1]);
                shape.point_at(d1 + fraction * (d2 - d1))
            }
        }
    }
}

/// A line string in degrees, parameterized by planar arc length.
pub struct Polyline {
    pts: Vec<LatLon>,
    // cumulative[i] is the distance along the line to pts[i]
    cumulative: Vec<f64>,
}

impl Polyline {
    pub fn new(raw: Vec<LatLon>) -> Result<Self> {
        let mut pts: Vec<LatLon> = Vec::with_capacity(raw.len());
        for pt in raw {
            if pts.last() != Some(&pt) {
                pts.push(pt);
            }
        }
        if pts.len() < 2 {
            bail!("Polyline needs at least 2 distinct points, got {}", pts.len());
        }

        let mut cumulative = Vec::with_capacity(pts.len());
        let mut dist = 0.0;
        cumulative.push(dist);
        for pair in pts.windows(2) {
            dist += planar_dist(pair[0], pair[1]);
            cumulative.push(dist);
        }
        Ok(Self { pts, cumulative })
    }

    pub fn length(&self) -> f64 {
        self.cumulative[self.cumulative.len() - 1]
    }

    /// Clamped to the ends of the line
    pub fn point_at(&self, dist: f64) -> LatLon {
        if dist <= 0.0 {
            return self.pts[0];
        }
        if dist >= self.length() {
            return self.pts[self.pts.len() - 1];
        }
        // The first point strictly past dist; at least 1, because cumulative[0] is 0
        let idx = self.cumulative.partition_point(|d| *d <= dist);
        let (d1, d2) = (self.cumulative[idx - 1], self.cumulative[idx]);
        self.pts[idx - 1].lerp(self.pts[idx], (dist - d1) / (d2 - d1))
    }

    /// The distance along the line of the point closest to `pt`, only considering the part of
    /// the line at or after `min_dist`. None if `min_dist` is past the end.
    pub fn project_from(&self, pt: LatLon, min_dist: f64) -> Option<f64> {
        if min_dist > self.length() {
            return None;
        }
        let mut best: Option<(f64, f64)> = None;
        for (idx, pair) in self.pts.windows(2).enumerate() {
            let (start, end) = (self.cumulative[idx], self.cumulative[idx + 1]);
            if end < min_dist {
                continue;
            }
            let len = end - start;
            let t_min = if start < min_dist {
                (min_dist - start) / len
            } else {
                0.0
            };
            let t = closest_fraction(pair[0], pair[1], pt).clamp(t_min, 1.0);
            let candidate = pair[0].lerp(pair[1], t);
            let dist_to_pt = planar_dist(candidate, pt);
            if best.map(|(_, d)| dist_to_pt < d).unwrap_or(true) {
                best = Some((start + t * len, dist_to_pt));
            }
        }
        best.map(|(along, _)| along)
    }
}

fn planar_dist(a: LatLon, b: LatLon) -> f64 {
    (b.lat - a.lat).hypot(b.lon - a.lon)
}

// Unclamped fraction along a->b of pt's perpendicular foot
fn closest_fraction(a: LatLon, b: LatLon, pt: LatLon) -> f64 {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let len_sq = dx * dx + dy * dy;
    ((pt.lon - a.lon) * dx + (pt.lat - a.lat) * dy) / len_sq
}
