use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{read_rows, record_problem, FeedError, StopID};

/// Plain WGS84 degrees. No projection happens anywhere; distances between consecutive stops are
/// short enough to treat degrees as planar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lerp(self, other: LatLon, fraction: f64) -> LatLon {
        LatLon {
            lat: self.lat + fraction * (other.lat - self.lat),
            lon: self.lon + fraction * (other.lon - self.lon),
        }
    }
}

pub struct Stop {
    pub pos: LatLon,
}

pub fn load<R: std::io::Read>(reader: R, problems: &mut Vec<FeedError>) -> BTreeMap<StopID, Stop> {
    let mut stops = BTreeMap::new();
    for rec in read_rows::<_, Record>(reader, "stops.txt", problems) {
        if stops.contains_key(&rec.stop_id) {
            record_problem(
                problems,
                FeedError::MalformedRow {
                    file: "stops.txt".to_string(),
                    reason: format!("duplicate {:?}", rec.stop_id),
                },
            );
            continue;
        }
        stops.insert(
            rec.stop_id,
            Stop {
                pos: LatLon::new(rec.stop_lat, rec.stop_lon),
            },
        );
    }
    stops
}

#[derive(Deserialize)]
struct Record {
    stop_id: StopID,
    stop_lat: f64,
    stop_lon: f64,
}
