use std::collections::{BTreeMap, BTreeSet};

use gtfs::{FeedError, LatLon, RouteID, ServiceID, ShapeID, StopTime, Time, Trip, TripID, GTFS};

use crate::path::{PathSource, Polyline};

/// A (time, position) anchor at one stop visit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub time: Time,
    pub pos: LatLon,
}

/// An active trip, ready to interpolate
pub struct ProjectedTrip<'a> {
    pub trip_id: TripID,
    pub route_id: RouteID,
    /// At least 2, with non-decreasing times
    pub waypoints: Vec<Waypoint>,
    pub path: PathSource<'a>,
}

/// The output of projecting a whole day, plus what got thrown away along the way
pub struct Projection<'a> {
    pub trips: BTreeMap<TripID, ProjectedTrip<'a>>,
    pub trips_considered: usize,
    pub skipped_trips: Vec<TripID>,
    pub skipped_visits: Vec<FeedError>,
}

/// Joins trips, stop times, and stops into per-trip waypoints for every trip running on one of
/// `active_services`. Bad stop visits are dropped individually; a trip left with fewer than 2 is
/// dropped entirely.
///
/// If `shapes` is given, trips with a matching shape get `PathSource::ShapeAvailable`.
pub fn project_waypoints<'a>(
    gtfs: &GTFS,
    active_services: &BTreeSet<ServiceID>,
    limit_trips: Option<usize>,
    shapes: Option<&'a BTreeMap<ShapeID, Polyline>>,
) -> Projection<'a> {
    let mut projection = Projection {
        trips: BTreeMap::new(),
        trips_considered: 0,
        skipped_trips: Vec::new(),
        skipped_visits: Vec::new(),
    };

    let active_trips = gtfs
        .trips
        .values()
        .filter(|trip| active_services.contains(&trip.service_id))
        .take(limit_trips.unwrap_or(usize::MAX));
    for trip in active_trips {
        projection.trips_considered += 1;
        let empty = Vec::new();
        let stop_times = gtfs.stop_times.get(&trip.trip_id).unwrap_or(&empty);
        let waypoints = trip_waypoints(gtfs, trip, stop_times, &mut projection.skipped_visits);
        if waypoints.len() < 2 {
            debug!(
                "{:?} has {} usable stop visits, skipping it",
                trip.trip_id,
                waypoints.len()
            );
            projection.skipped_trips.push(trip.trip_id.clone());
            continue;
        }

        let path = shapes
            .and_then(|shapes| shape_path(shapes, trip, &waypoints))
            .unwrap_or(PathSource::NoShapeAvailable);
        projection.trips.insert(
            trip.trip_id.clone(),
            ProjectedTrip {
                trip_id: trip.trip_id.clone(),
                route_id: trip.route_id.clone(),
                waypoints,
                path,
            },
        );
    }
    projection
}

fn trip_waypoints(
    gtfs: &GTFS,
    trip: &Trip,
    stop_times: &[StopTime],
    problems: &mut Vec<FeedError>,
) -> Vec<Waypoint> {
    let mut problem = |err: FeedError| {
        warn!("Skipping stop visit: {err}");
        problems.push(err);
    };

    // Keep the visits that agree with everything kept before them
    let mut kept: Vec<(&StopTime, LatLon)> = Vec::new();
    for st in stop_times {
        if let Some((prev, _)) = kept.last() {
            if prev.stop_sequence == st.stop_sequence {
                problem(FeedError::DuplicateSequence {
                    trip: trip.trip_id.clone(),
                    sequence: st.stop_sequence,
                });
                continue;
            }
            if st.arrival_time < prev.departure_time {
                problem(FeedError::TimeRegression {
                    trip: trip.trip_id.clone(),
                    sequence: st.stop_sequence,
                });
                continue;
            }
        }
        match gtfs.stops.get(&st.stop_id) {
            Some(stop) => kept.push((st, stop.pos)),
            None => problem(FeedError::DanglingStopReference {
                trip: trip.trip_id.clone(),
                stop: st.stop_id.clone(),
            }),
        }
    }

    // Leave each stop at departure. Nothing leaves the last stop, so use arrival there.
    let last = kept.len().saturating_sub(1);
    kept.into_iter()
        .enumerate()
        .map(|(idx, (st, pos))| Waypoint {
            time: if idx == last {
                st.arrival_time
            } else {
                st.departure_time
            },
            pos,
        })
        .collect()
}

fn shape_path<'a>(
    shapes: &'a BTreeMap<ShapeID, Polyline>,
    trip: &Trip,
    waypoints: &[Waypoint],
) -> Option<PathSource<'a>> {
    let shape = shapes.get(trip.shape_id.as_ref()?)?;
    let path = PathSource::along_shape(shape, waypoints);
    if path.is_none() {
        warn!(
            "Couldn't match the stops of {:?} to {:?}, using straight lines",
            trip.trip_id, trip.shape_id
        );
    }
    path
}
