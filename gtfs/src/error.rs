use crate::{StopID, TripID};

/// Problems found in a feed. Everything except `NoServiceData` is row-level: the offending row
/// is skipped and the build carries on.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FeedError {
    #[error("the feed has no calendar.txt or calendar_dates.txt entries")]
    NoServiceData,

    #[error("malformed time {text:?}: {reason}")]
    MalformedTime { text: String, reason: String },

    #[error("{trip:?} visits unknown {stop:?}")]
    DanglingStopReference { trip: TripID, stop: StopID },

    #[error("{trip:?} repeats stop_sequence {sequence}")]
    DuplicateSequence { trip: TripID, sequence: u32 },

    #[error("{trip:?} goes back in time at stop_sequence {sequence}")]
    TimeRegression { trip: TripID, sequence: u32 },

    #[error("{file}: {reason}")]
    MalformedRow { file: String, reason: String },
}

impl FeedError {
    pub(crate) fn malformed_time(text: &str, reason: impl Into<String>) -> Self {
        Self::MalformedTime {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}
