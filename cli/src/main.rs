#[macro_use]
extern crate log;

use std::path::PathBuf;

use abstutil::Timer;
use anyhow::Result;
use chrono::NaiveDate;
use structopt::StructOpt;

use gtfs::GTFS;
use trails::{TrailConfig, TrailStore};

#[derive(StructOpt)]
#[structopt(
    name = "bus_trails",
    about = "Samples every scheduled trip of a day into positions every 5 seconds"
)]
enum Args {
    /// Make sure the trails for a date are cached, building them if needed
    Build {
        #[structopt(flatten)]
        feed: FeedArgs,
        /// Rebuild even if the trails are already cached
        #[structopt(long)]
        force: bool,
    },
    /// List the services running on a date
    Services {
        /// The service date, as YYYY-MM-DD
        #[structopt(long)]
        date: NaiveDate,
        /// The path to a GTFS directory or .zip
        #[structopt(long, default_value = "data/gtfs/LATEST", parse(from_os_str))]
        gtfs: PathBuf,
    },
    /// Write the trails for a date as GeoJSON, one LineString per trip
    ExportGeojson {
        #[structopt(flatten)]
        feed: FeedArgs,
        #[structopt(long, parse(from_os_str))]
        output: PathBuf,
    },
}

#[derive(StructOpt)]
struct FeedArgs {
    /// The service date, as YYYY-MM-DD
    #[structopt(long)]
    date: NaiveDate,
    /// The path to a GTFS directory or .zip
    #[structopt(long, default_value = "data/gtfs/LATEST", parse(from_os_str))]
    gtfs: PathBuf,
    /// Where cached trails live
    #[structopt(long, default_value = "data/cache", parse(from_os_str))]
    cache_dir: PathBuf,
    /// Only process this many trips. For debugging.
    #[structopt(long)]
    limit_trips: Option<usize>,
    /// Follow shapes.txt geometry between stops when a trip has it
    #[structopt(long)]
    follow_shapes: bool,
}

impl FeedArgs {
    fn store(&self) -> TrailStore {
        TrailStore::new(
            TrailConfig::new(&self.gtfs, &self.cache_dir)
                .with_limit_trips(self.limit_trips)
                .with_follow_shapes(self.follow_shapes),
        )
    }
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    match Args::from_iter(abstutil::cli_args()) {
        Args::Build { feed, force } => {
            let store = feed.store();
            let mut timer = Timer::new(format!("build trails for {}", feed.date));
            let cache = if force {
                store.build(feed.date, &mut timer)?.0
            } else {
                store.ensure(feed.date, &mut timer)?
            };
            info!(
                "{} has {} samples",
                store.path(feed.date).display(),
                abstutil::prettyprint_usize(cache.samples.len())
            );
        }
        Args::Services { date, gtfs } => {
            let gtfs = GTFS::load(gtfs)?;
            for service_id in gtfs.calendar.active_services(date)? {
                match gtfs.calendar.services.get(&service_id) {
                    Some(service) => println!(
                        "{service_id}: {}, {} to {}",
                        service.days_of_week.describe(),
                        service.start_date,
                        service.end_date
                    ),
                    None => println!("{service_id}: only by exception"),
                }
            }
        }
        Args::ExportGeojson { feed, output } => {
            let store = feed.store();
            let mut timer = Timer::new(format!("export trails for {}", feed.date));
            let cache = store.ensure(feed.date, &mut timer)?;
            fs_err::write(&output, serde_json::to_string(&cache.to_geojson())?)?;
            info!("Wrote {}", output.display());
        }
    }
    Ok(())
}
