//! Turns a static timetable into per-trip positions sampled every few seconds over one service
//! day, and keeps the result cached on disk per date.
//!
//! The pipeline for one date: the calendar says which services run, the projector turns each
//! running trip into timed waypoints at its stops, the interpolator samples positions between
//! them, and the store merges everything into one artifact.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod cache;
mod config;
mod error;
mod export;
mod path;
mod trajectory;
mod waypoints;

use std::collections::BTreeMap;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use chrono::NaiveDate;
use gtfs::{ShapeID, GTFS};
use rayon::prelude::*;

pub use self::cache::{TrailCache, TrailStore};
pub use self::config::TrailConfig;
pub use self::error::CacheError;
pub use self::path::{PathSource, Polyline};
pub use self::trajectory::{interpolate, TrailSample, SAMPLE_INTERVAL_SECONDS};
pub use self::waypoints::{project_waypoints, ProjectedTrip, Projection, Waypoint};

/// What happened during one build
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildReport {
    pub active_services: usize,
    pub trips_considered: usize,
    pub trips_interpolated: usize,
    pub trips_skipped: usize,
    pub visits_skipped: usize,
    /// Rows dropped while loading the feed, for any date
    pub feed_problems: usize,
    pub samples: usize,
}

impl BuildReport {
    pub fn describe(&self) -> String {
        format!(
            "{} active services, {} of {} trips interpolated ({} skipped, {} stop visits dropped), {} samples. {} feed rows were unusable",
            self.active_services,
            prettyprint_usize(self.trips_interpolated),
            prettyprint_usize(self.trips_considered),
            prettyprint_usize(self.trips_skipped),
            prettyprint_usize(self.visits_skipped),
            prettyprint_usize(self.samples),
            prettyprint_usize(self.feed_problems),
        )
    }
}

/// Computes the trails for one date from an already loaded feed. Nothing is written.
///
/// Fails only when the feed has no calendar at all; bad rows are skipped and counted.
pub fn build_trails(
    gtfs: &GTFS,
    date: NaiveDate,
    config: &TrailConfig,
    timer: &mut Timer,
) -> Result<(TrailCache, BuildReport)> {
    timer.start("resolve calendar");
    let active_services = gtfs.calendar.active_services(date)?;
    timer.stop("resolve calendar");
    info!("{} services run on {date}", active_services.len());

    let shapes = if config.follow_shapes {
        Some(shape_polylines(gtfs))
    } else {
        None
    };

    timer.start("project waypoints");
    let projection = project_waypoints(gtfs, &active_services, config.limit_trips, shapes.as_ref());
    timer.stop("project waypoints");

    timer.start("interpolate trips");
    // BTreeMap order, preserved by the ordered collect, keeps the output reproducible
    let trips: Vec<&ProjectedTrip> = projection.trips.values().collect();
    let per_trip: Vec<Vec<TrailSample>> = trips
        .par_iter()
        .map(|trip| interpolate(&trip.trip_id, &trip.route_id, &trip.waypoints, &trip.path))
        .collect();
    let samples: Vec<TrailSample> = per_trip.into_iter().flatten().collect();
    timer.stop("interpolate trips");

    let report = BuildReport {
        active_services: active_services.len(),
        trips_considered: projection.trips_considered,
        trips_interpolated: projection.trips.len(),
        trips_skipped: projection.skipped_trips.len(),
        visits_skipped: projection.skipped_visits.len(),
        feed_problems: gtfs.problems.len(),
        samples: samples.len(),
    };
    Ok((TrailCache { date, samples }, report))
}

fn shape_polylines(gtfs: &GTFS) -> BTreeMap<ShapeID, Polyline> {
    let mut results = BTreeMap::new();
    for (shape_id, pts) in &gtfs.shapes {
        match Polyline::new(pts.clone()) {
            Ok(pl) => {
                results.insert(shape_id.clone(), pl);
            }
            Err(err) => warn!("Ignoring {:?}: {err}", shape_id),
        }
    }
    results
}
