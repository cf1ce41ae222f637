use std::path::PathBuf;

use chrono::NaiveDate;

/// Why a cached artifact couldn't be used. A miss or a corrupt file means "build it"; an unreadable
/// one is left alone.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no trails cached for {date}")]
    CacheMiss { date: NaiveDate },

    #[error("{}: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("couldn't read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
