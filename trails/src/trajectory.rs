use gtfs::{LatLon, RouteID, TripID};
use serde::{Deserialize, Serialize};

use crate::path::PathSource;
use crate::Waypoint;

/// Samples land on every multiple of this many seconds
pub const SAMPLE_INTERVAL_SECONDS: u32 = 5;

/// One row of the artifact. Field order is the column order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrailSample {
    pub trip_id: TripID,
    /// Seconds since midnight of the service day; may exceed 86400
    pub timestamp: u32,
    pub lat: f64,
    pub lon: f64,
    pub route_id: RouteID,
}

/// Samples one trip. Within each moving segment, there's a sample at the segment's start and at
/// every multiple of the interval strictly before its end. The trip's last waypoint closes the
/// sequence. Segments where no time passes contribute nothing, so dwelling never duplicates an
/// instant.
///
/// Timestamps come out strictly increasing. Waypoint times need to be non-decreasing; a segment
/// going backwards is ignored.
pub fn interpolate(
    trip_id: &TripID,
    route_id: &RouteID,
    waypoints: &[Waypoint],
    path: &PathSource,
) -> Vec<TrailSample> {
    let mut samples = Vec::new();
    let mut push = |timestamp: u32, pos: LatLon| {
        samples.push(TrailSample {
            trip_id: trip_id.clone(),
            timestamp,
            lat: pos.lat,
            lon: pos.lon,
            route_id: route_id.clone(),
        });
    };

    for (idx, pair) in waypoints.windows(2).enumerate() {
        let t0 = pair[0].time.inner_seconds();
        let t1 = pair[1].time.inner_seconds();
        if t1 <= t0 {
            continue;
        }
        let duration = (t1 - t0) as f64;

        push(t0, path.position(waypoints, idx, 0.0));
        let mut t = (t0 / SAMPLE_INTERVAL_SECONDS + 1) * SAMPLE_INTERVAL_SECONDS;
        while t < t1 {
            let fraction = (t - t0) as f64 / duration;
            push(t, path.position(waypoints, idx, fraction));
            t += SAMPLE_INTERVAL_SECONDS;
        }
    }

    if let Some(last) = waypoints.last() {
        push(last.time.inner_seconds(), last.pos);
    }
    samples
}

#[cfg(test)]
mod tests {
    use gtfs::Time;

    use super::*;

    fn waypoints(raw: &[(u32, f64, f64)]) -> Vec<Waypoint> {
        raw.iter()
            .map(|(t, lat, lon)| Waypoint {
                time: Time::from_seconds(*t),
                pos: LatLon::new(*lat, *lon),
            })
            .collect()
    }

    fn run(raw: &[(u32, f64, f64)]) -> Vec<TrailSample> {
        interpolate(
            &TripID::new("T1"),
            &RouteID::new("R1"),
            &waypoints(raw),
            &PathSource::NoShapeAvailable,
        )
    }

    fn timestamps(samples: &[TrailSample]) -> Vec<u32> {
        samples.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn midpoint_of_a_straight_segment() {
        let samples = run(&[(0, 33.0, 132.0), (100, 33.01, 132.02)]);
        let expected: Vec<u32> = (0..=100).step_by(5).collect();
        assert_eq!(timestamps(&samples), expected);

        let mid = samples.iter().find(|s| s.timestamp == 50).unwrap();
        assert!((mid.lat - 33.005).abs() < 1e-9);
        assert!((mid.lon - 132.01).abs() < 1e-9);

        assert_eq!((samples[0].lat, samples[0].lon), (33.0, 132.0));
        let last = samples.last().unwrap();
        assert_eq!((last.lat, last.lon), (33.01, 132.02));
        assert!(samples
            .iter()
            .all(|s| s.trip_id == TripID::new("T1") && s.route_id == RouteID::new("R1")));
    }

    #[test]
    fn unaligned_waypoints_become_boundaries() {
        let samples = run(&[(3, 0.0, 0.0), (17, 0.0, 1.0), (30, 0.0, 2.0)]);
        assert_eq!(timestamps(&samples), vec![3, 5, 10, 15, 17, 20, 25, 30]);
        // 17 is exactly the second stop
        assert_eq!(samples[4].lon, 1.0);
    }

    #[test]
    fn dwell_does_not_duplicate() {
        // Arrive at 100 and leave immediately, but with a second waypoint at the same instant
        let samples = run(&[
            (0, 0.0, 0.0),
            (100, 0.0, 1.0),
            (100, 0.0, 1.0),
            (150, 0.0, 2.0),
        ]);
        let ts = timestamps(&samples);
        let expected: Vec<u32> = (0..=150).step_by(5).collect();
        assert_eq!(ts, expected);
        let at_stop = samples.iter().find(|s| s.timestamp == 100).unwrap();
        assert_eq!(at_stop.lon, 1.0);
    }

    #[test]
    fn interior_steps_are_the_interval() {
        let samples = run(&[
            (25_200, 33.0, 132.0),
            (25_320, 33.01, 132.02),
            (25_600, 33.03, 132.0),
            (25_600, 33.03, 132.0),
            (25_900, 33.05, 132.05),
        ]);
        for pair in samples.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, SAMPLE_INTERVAL_SECONDS);
        }
    }

    #[test]
    fn after_midnight_is_not_wrapped() {
        let samples = run(&[(86_390, 0.0, 0.0), (86_412, 0.0, 1.0)]);
        assert_eq!(
            timestamps(&samples),
            vec![86_390, 86_395, 86_400, 86_405, 86_410, 86_412]
        );
    }

    #[test]
    fn zero_duration_trip() {
        let samples = run(&[(60, 0.0, 0.0), (60, 0.0, 1.0)]);
        assert_eq!(timestamps(&samples), vec![60]);
        assert_eq!(samples[0].lon, 1.0);
        assert!(run(&[]).is_empty());
    }
}
