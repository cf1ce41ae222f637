use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use abstutil::Timer;
use anyhow::Result;
use chrono::NaiveDate;
use gtfs::GTFS;

use crate::{build_trails, BuildReport, CacheError, TrailConfig, TrailSample};

const COLUMNS: [&str; 5] = ["trip_id", "timestamp", "lat", "lon", "route_id"];

/// Every sample for one date. Trips are contiguous and ordered by ID; samples within a trip are
/// in time order.
#[derive(Clone, Debug, PartialEq)]
pub struct TrailCache {
    pub date: NaiveDate,
    pub samples: Vec<TrailSample>,
}

/// Artifacts on disk, one per date. Once written, an artifact is only ever replaced whole.
///
/// Callers pick their own policy: `load` to only read, `build` to force a rebuild, `ensure` to
/// build only when needed.
pub struct TrailStore {
    config: TrailConfig,
    // Callers in this process wait on the same date instead of building twice
    building: Mutex<BTreeMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl TrailStore {
    pub fn new(config: TrailConfig) -> Self {
        Self {
            config,
            building: Mutex::new(BTreeMap::new()),
        }
    }

    /// Non-default options change the output, so they get their own artifact instead of
    /// shadowing the full day.
    pub fn path(&self, date: NaiveDate) -> PathBuf {
        let mut name = format!("bus_trails_{date}");
        if let Some(n) = self.config.limit_trips {
            name.push_str(&format!("-limit{n}"));
        }
        if self.config.follow_shapes {
            name.push_str("-shapes");
        }
        self.config.cache_dir.join(format!("{name}.csv"))
    }

    pub fn load(&self, date: NaiveDate) -> Result<TrailCache, CacheError> {
        let path = self.path(date);
        let corrupt = |reason: String| CacheError::CacheCorrupt {
            path: path.clone(),
            reason,
        };
        let from_csv = |err: csv::Error| {
            if err.is_io_error() {
                match err.into_kind() {
                    csv::ErrorKind::Io(source) => CacheError::Unreadable {
                        path: path.clone(),
                        source,
                    },
                    kind => corrupt(format!("{kind:?}")),
                }
            } else {
                corrupt(err.to_string())
            }
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::CacheMiss { date });
            }
            Err(source) => {
                return Err(CacheError::Unreadable {
                    path: path.clone(),
                    source,
                })
            }
        };
        let mut reader = csv::Reader::from_reader(BufReader::new(file));
        let headers = reader.headers().map_err(from_csv)?;
        if !headers.iter().eq(COLUMNS.iter().copied()) {
            return Err(corrupt(format!("unexpected columns {:?}", headers)));
        }

        let mut samples: Vec<TrailSample> = Vec::new();
        for rec in reader.deserialize() {
            samples.push(rec.map_err(from_csv)?);
        }
        Ok(TrailCache { date, samples })
    }

    /// Always rebuilds from the feed and replaces whatever was cached.
    pub fn build(&self, date: NaiveDate, timer: &mut Timer) -> Result<(TrailCache, BuildReport)> {
        timer.start("load feed");
        let gtfs = GTFS::load(&self.config.gtfs_path)?;
        timer.stop("load feed");

        let (cache, report) = build_trails(&gtfs, date, &self.config, timer)?;
        info!("Trails for {date}: {}", report.describe());

        timer.start("write cache");
        let path = self.save(&cache)?;
        timer.stop("write cache");
        info!("Wrote {}", path.display());
        Ok((cache, report))
    }

    /// Loads the cached trails, building them first if they're missing or corrupt. Safe to
    /// call concurrently.
    pub fn ensure(&self, date: NaiveDate, timer: &mut Timer) -> Result<TrailCache> {
        let lock = self.lock_for(date);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.load_or_build(date, timer)
        };
        self.release(date, lock);
        result
    }

    fn load_or_build(&self, date: NaiveDate, timer: &mut Timer) -> Result<TrailCache> {
        match self.load(date) {
            Ok(cache) => return Ok(cache),
            Err(CacheError::CacheMiss { .. }) => {
                info!("No trails cached for {date} yet, building");
            }
            Err(err @ CacheError::CacheCorrupt { .. }) => {
                warn!("Discarding corrupt cache: {err}");
                let path = self.path(date);
                if let Err(err) = std::fs::remove_file(&path) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        bail!("Couldn't remove {}: {err}", path.display());
                    }
                }
            }
            // Might be fine once whatever's wrong with the filesystem clears up
            Err(err @ CacheError::Unreadable { .. }) => return Err(err.into()),
        }
        let (cache, _) = self.build(date, timer)?;
        Ok(cache)
    }

    /// Writes to a temporary file next to the final one, then renames it into place, so readers
    /// see the old artifact or the new one, never half of one.
    pub fn save(&self, cache: &TrailCache) -> Result<PathBuf> {
        let path = self.path(cache.date);
        std::fs::create_dir_all(&self.config.cache_dir)
            .map_err(|err| anyhow!("{}: {err}", self.config.cache_dir.display()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".bus_trails_")
            .suffix(".tmp")
            .tempfile_in(&self.config.cache_dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer.write_record(COLUMNS)?;
            for sample in &cache.samples {
                writer.serialize(sample)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .map_err(|err| anyhow!("{}: {}", path.display(), err.error))?;
        Ok(path)
    }

    fn lock_for(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut building = self
            .building
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        building.entry(date).or_default().clone()
    }

    fn release(&self, date: NaiveDate, lock: Arc<Mutex<()>>) {
        let mut building = self
            .building
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference lives in the map and the other is ours; anybody else is still waiting
        if Arc::strong_count(&lock) == 2 {
            building.remove(&date);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use gtfs::TripID;

    use super::*;
    use crate::tests::{date, write_feed, STOPS, STOP_TIMES, TRIPS};

    fn store(root: &Path) -> TrailStore {
        write_feed(&root.join("gtfs"), STOPS, TRIPS, STOP_TIMES);
        TrailStore::new(TrailConfig::new(root.join("gtfs"), root.join("cache")))
    }

    #[test]
    fn load_before_build_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert!(matches!(
            store.load(date("2025-07-10")),
            Err(CacheError::CacheMiss { .. })
        ));
    }

    #[test]
    fn build_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        let (built, report) = store.build(day, &mut Timer::throwaway()).unwrap();
        assert_eq!(report.samples, built.samples.len());

        let loaded = store.load(day).unwrap();
        assert_eq!(loaded, built);

        let text = std::fs::read_to_string(store.path(day)).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("trip_id,timestamp,lat,lon,route_id"));
        assert_eq!(lines.next(), Some("T1,28800,33.0,132.0,R1"));

        // Nothing temporary is left behind
        let files: Vec<_> = std::fs::read_dir(dir.path().join("cache"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn rebuilds_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        store.build(day, &mut Timer::throwaway()).unwrap();
        let first = std::fs::read(store.path(day)).unwrap();
        store.build(day, &mut Timer::throwaway()).unwrap();
        let second = std::fs::read(store.path(day)).unwrap();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_day_is_still_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        // A Sunday
        let day = date("2025-07-13");
        let cache = store.ensure(day, &mut Timer::throwaway()).unwrap();
        assert!(cache.samples.is_empty());
        assert_eq!(
            std::fs::read_to_string(store.path(day)).unwrap(),
            "trip_id,timestamp,lat,lon,route_id\n"
        );
        assert_eq!(store.load(day).unwrap().samples.len(), 0);
    }

    #[test]
    fn ensure_uses_the_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        // Plant an artifact that the feed would never produce
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();
        std::fs::write(
            store.path(day),
            "trip_id,timestamp,lat,lon,route_id\nPLANTED,0,1.0,2.0,R9\n",
        )
        .unwrap();
        let cache = store.ensure(day, &mut Timer::throwaway()).unwrap();
        assert_eq!(cache.samples.len(), 1);
        assert_eq!(cache.samples[0].trip_id, TripID::new("PLANTED"));
    }

    #[test]
    fn corrupt_artifacts_are_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        std::fs::create_dir_all(dir.path().join("cache")).unwrap();

        for garbage in [
            "",
            "trip_id,timestamp\nT1,0\n",
            "trip_id,timestamp,lat,lon,route_id\nT1,28800,33.0,132.0,R1\nT1,288",
            "trip_id,timestamp,lat,lon,route_id\nT1,noon,33.0,132.0,R1\n",
        ] {
            std::fs::write(store.path(day), garbage).unwrap();
            assert!(matches!(
                store.load(day),
                Err(CacheError::CacheCorrupt { .. })
            ));
            let cache = store.ensure(day, &mut Timer::throwaway()).unwrap();
            assert_eq!(cache.samples.len(), 46);
            assert_eq!(store.load(day).unwrap(), cache);
        }
    }

    #[test]
    fn concurrent_ensure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        let results: Vec<TrailCache> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| store.ensure(day, &mut Timer::throwaway()).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for cache in &results {
            assert_eq!(cache, &results[0]);
        }
        assert_eq!(store.load(day).unwrap(), results[0]);
        assert!(store.building.lock().unwrap().is_empty());
    }

    #[test]
    fn options_get_their_own_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let full = store(dir.path());
        let limited = TrailStore::new(full.config.clone().with_limit_trips(Some(1)));
        let shapes = TrailStore::new(full.config.clone().with_follow_shapes(true));
        let day = date("2025-07-10");

        let one_trip = limited.ensure(day, &mut Timer::throwaway()).unwrap();
        assert_eq!(one_trip.samples.len(), 21);
        shapes.ensure(day, &mut Timer::throwaway()).unwrap();

        let cache = full.ensure(day, &mut Timer::throwaway()).unwrap();
        assert_eq!(cache.samples.len(), 46);
        let (rebuilt, _) = full.build(day, &mut Timer::throwaway()).unwrap();
        assert_eq!(cache, rebuilt);
        assert_eq!(limited.load(day).unwrap(), one_trip);

        assert!(full.path(day).ends_with("bus_trails_2025-07-10.csv"));
        assert!(limited.path(day).ends_with("bus_trails_2025-07-10-limit1.csv"));
        assert!(shapes.path(day).ends_with("bus_trails_2025-07-10-shapes.csv"));
        assert!(full.building.lock().unwrap().is_empty());
    }

    #[test]
    fn unreadable_artifacts_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let day = date("2025-07-10");
        // Opening succeeds, but reading fails with an I/O error
        std::fs::create_dir_all(store.path(day)).unwrap();

        assert!(matches!(
            store.load(day),
            Err(CacheError::Unreadable { .. })
        ));
        assert!(store.ensure(day, &mut Timer::throwaway()).is_err());
        assert!(store.path(day).is_dir());
    }

    #[test]
    fn missing_feed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrailStore::new(TrailConfig::new(
            dir.path().join("nowhere"),
            dir.path().join("cache"),
        ));
        assert!(store.ensure(date("2025-07-10"), &mut Timer::throwaway()).is_err());
        assert!(matches!(
            store.load(date("2025-07-10")),
            Err(CacheError::CacheMiss { .. })
        ));
    }
}
