#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod calendar;
mod error;
mod ids;
mod shapes;
mod stop_times;
mod stops;
mod time;
mod trips;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::de::DeserializeOwned;
use zip::ZipArchive;

pub use calendar::{Calendar, DaysOfWeek, ExceptionType, Service};
pub use error::FeedError;
pub use ids::{RouteID, ServiceID, ShapeID, StopID, TripID};
pub use stop_times::StopTime;
pub use stops::{LatLon, Stop};
pub use time::Time;
pub use trips::Trip;

/// The tables of one static feed needed to place vehicles over a day. Loaded fresh for every
/// build and never mutated afterwards.
pub struct GTFS {
    pub stops: BTreeMap<StopID, Stop>,
    pub trips: BTreeMap<TripID, Trip>,
    /// Per trip, sorted by stop_sequence. Rows with unusable times are already gone.
    pub stop_times: BTreeMap<TripID, Vec<StopTime>>,
    pub calendar: Calendar,
    /// Points in shape_pt_sequence order
    pub shapes: BTreeMap<ShapeID, Vec<LatLon>>,
    /// Every row skipped while loading
    pub problems: Vec<FeedError>,
}

impl GTFS {
    /// Loads from a directory of .txt tables or a .zip archive of them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut source = FeedSource::open(path)?;
        let mut problems = Vec::new();

        let stops = stops::load(source.required("stops.txt")?, &mut problems);
        let trips = trips::load(source.required("trips.txt")?, &mut problems);
        let mut stop_times = stop_times::load(source.required("stop_times.txt")?, &mut problems);

        let orphans: Vec<TripID> = stop_times
            .keys()
            .filter(|id| !trips.contains_key(*id))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            warn!(
                "Stop times defined for {} unknown trips, like {:?}",
                orphans.len(),
                orphans[0]
            );
            for id in orphans {
                stop_times.remove(&id);
            }
        }

        let mut calendar = Calendar::empty();
        if let Some(reader) = source.optional("calendar.txt")? {
            calendar::load(&mut calendar, reader, &mut problems);
        }
        if let Some(reader) = source.optional("calendar_dates.txt")? {
            calendar::load_exceptions(&mut calendar, reader, &mut problems);
        }

        let shapes = match source.optional("shapes.txt")? {
            Some(reader) => shapes::load(reader, &mut problems),
            None => BTreeMap::new(),
        };

        info!(
            "Loaded {} stops, {} trips, {} services, {} shapes from {}. {} rows skipped",
            stops.len(),
            trips.len(),
            calendar.services.len(),
            shapes.len(),
            path.display(),
            problems.len()
        );

        Ok(Self {
            stops,
            trips,
            stop_times,
            calendar,
            shapes,
            problems,
        })
    }
}

enum FeedSource {
    Dir(PathBuf),
    Zip(ZipArchive<File>),
}

impl FeedSource {
    fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Dir(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|err| anyhow!("{}: {err}", path.display()))?;
        let archive = ZipArchive::new(file).map_err(|err| anyhow!("{}: {err}", path.display()))?;
        Ok(Self::Zip(archive))
    }

    fn optional(&mut self, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        match self {
            Self::Dir(dir) => {
                let path = dir.join(name);
                if !path.exists() {
                    return Ok(None);
                }
                let file = File::open(&path).map_err(|err| anyhow!("{}: {err}", path.display()))?;
                Ok(Some(Box::new(BufReader::new(file))))
            }
            Self::Zip(archive) => {
                // Some feeds are zipped with a top-level folder
                let entry = archive
                    .file_names()
                    .find(|f| *f == name || f.ends_with(&format!("/{name}")))
                    .map(|f| f.to_string());
                match entry {
                    Some(entry) => {
                        let file = archive
                            .by_name(&entry)
                            .map_err(|err| anyhow!("{entry}: {err}"))?;
                        Ok(Some(Box::new(file)))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    fn required(&mut self, name: &str) -> Result<Box<dyn Read + '_>> {
        match self.optional(name)? {
            Some(reader) => Ok(reader),
            None => bail!("Feed is missing {name}"),
        }
    }
}

/// Deserializes every row it can. Bad rows are logged, recorded, and skipped.
fn read_rows<R: Read, T: DeserializeOwned>(
    reader: R,
    file: &str,
    problems: &mut Vec<FeedError>,
) -> Vec<T> {
    let mut rows = Vec::new();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    for rec in reader.deserialize() {
        match rec {
            Ok(row) => rows.push(row),
            Err(err) => record_problem(
                problems,
                FeedError::MalformedRow {
                    file: file.to_string(),
                    reason: err.to_string(),
                },
            ),
        }
    }
    rows
}

fn record_problem(problems: &mut Vec<FeedError>, problem: FeedError) {
    warn!("Skipping row: {problem}");
    problems.push(problem);
}
