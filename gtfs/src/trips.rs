use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{read_rows, record_problem, FeedError, RouteID, ServiceID, ShapeID, TripID};

pub struct Trip {
    pub trip_id: TripID,
    pub route_id: RouteID,
    pub service_id: ServiceID,
    /// None when the feed has no detailed path geometry for this trip
    pub shape_id: Option<ShapeID>,
}

pub fn load<R: std::io::Read>(reader: R, problems: &mut Vec<FeedError>) -> BTreeMap<TripID, Trip> {
    let mut trips = BTreeMap::new();
    for rec in read_rows::<_, Record>(reader, "trips.txt", problems) {
        if trips.contains_key(&rec.trip_id) {
            record_problem(
                problems,
                FeedError::MalformedRow {
                    file: "trips.txt".to_string(),
                    reason: format!("duplicate {:?}", rec.trip_id),
                },
            );
            continue;
        }
        trips.insert(
            rec.trip_id.clone(),
            Trip {
                trip_id: rec.trip_id,
                route_id: rec.route_id,
                service_id: rec.service_id,
                shape_id: rec.shape_id,
            },
        );
    }
    trips
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    route_id: RouteID,
    service_id: ServiceID,
    #[serde(default)]
    shape_id: Option<ShapeID>,
}
