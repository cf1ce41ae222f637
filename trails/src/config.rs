use std::path::PathBuf;

/// Everything a build needs besides the date.
#[derive(Clone, Debug)]
pub struct TrailConfig {
    /// A directory of GTFS tables or a .zip of them
    pub gtfs_path: PathBuf,
    /// Where one artifact per date lives
    pub cache_dir: PathBuf,
    /// Only process the first N active trips, ordered by trip ID. For debugging.
    pub limit_trips: Option<usize>,
    /// Place samples along shapes.txt geometry when a trip has it, instead of straight lines
    /// between stops
    pub follow_shapes: bool,
}

impl TrailConfig {
    pub fn new(gtfs_path: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            gtfs_path: gtfs_path.into(),
            cache_dir: cache_dir.into(),
            limit_trips: None,
            follow_shapes: false,
        }
    }

    pub fn with_limit_trips(mut self, limit: Option<usize>) -> Self {
        self.limit_trips = limit;
        self
    }

    pub fn with_follow_shapes(mut self, follow_shapes: bool) -> Self {
        self.follow_shapes = follow_shapes;
        self
    }
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self::new("data/gtfs/LATEST", "data/cache")
    }
}
