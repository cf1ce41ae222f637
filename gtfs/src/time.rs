use std::fmt;

use crate::FeedError;

/// Seconds since midnight of a service day. Schedules express trips running past local midnight
/// with hours of 24 and beyond, so this is never wrapped at 86400; 25:15:30 and 01:15:30 are
/// different instants of the same service day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(u32);

impl Time {
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    pub fn inner_seconds(self) -> u32 {
        self.0
    }

    /// Parses `HH:MM:SS`. Hours have no upper bound besides overflow; minutes and seconds must be
    /// below 60.
    pub fn parse(text: &str) -> Result<Self, FeedError> {
        let parts: Vec<&str> = text.trim().split(':').collect();
        if parts.len() != 3 {
            return Err(FeedError::malformed_time(
                text,
                format!("expected 3 fields, found {}", parts.len()),
            ));
        }
        let hours = parse_field(text, parts[0])?;
        let minutes = parse_field(text, parts[1])?;
        let seconds = parse_field(text, parts[2])?;
        if minutes >= 60 {
            return Err(FeedError::malformed_time(text, "minutes must be below 60"));
        }
        if seconds >= 60 {
            return Err(FeedError::malformed_time(text, "seconds must be below 60"));
        }
        hours
            .checked_mul(3600)
            .and_then(|x| x.checked_add(minutes * 60 + seconds))
            .map(Time)
            .ok_or_else(|| FeedError::malformed_time(text, "hours out of range"))
    }

    pub fn hours_minutes_seconds(self) -> (u32, u32, u32) {
        (self.0 / 3600, (self.0 % 3600) / 60, self.0 % 60)
    }
}

fn parse_field(text: &str, field: &str) -> Result<u32, FeedError> {
    // u32::from_str accepts a leading '+', which isn't valid here
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FeedError::malformed_time(
            text,
            format!("{field:?} isn't a number"),
        ));
    }
    field
        .parse::<u32>()
        .map_err(|err| FeedError::malformed_time(text, err.to_string()))
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (h, m, s) = self.hours_minutes_seconds();
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_after_midnight() {
        assert_eq!(Time::parse("25:15:30").unwrap().inner_seconds(), 90930);
        assert_eq!(Time::parse("00:00:00").unwrap(), Time::from_seconds(0));
        assert_eq!(Time::parse("47:59:59").unwrap().inner_seconds(), 172799);
        // Single-digit hours show up in real feeds
        assert_eq!(Time::parse(" 8:05:00").unwrap().inner_seconds(), 29100);
    }

    #[test]
    fn formats_without_wrapping() {
        assert_eq!(Time::from_seconds(90930).to_string(), "25:15:30");
        assert_eq!(Time::from_seconds(0).to_string(), "00:00:00");
        assert_eq!(Time::from_seconds(360_000).to_string(), "100:00:00");
    }

    #[test]
    fn round_trips() {
        for seconds in [0, 59, 3600, 86399, 86400, 90930, 172799, 359_999] {
            let t = Time::from_seconds(seconds);
            assert_eq!(Time::parse(&t.to_string()).unwrap(), t);
        }
        for text in ["06:30:00", "23:59:59", "24:00:00", "25:15:30"] {
            assert_eq!(Time::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn rejects_malformed() {
        for text in [
            "", "12:00", "12:00:00:00", "ab:00:00", "12:60:00", "12:00:60", "12::00", "-1:00:00",
            "+1:00:00", "12:3x:00", "99999999:00:00",
        ] {
            assert!(
                matches!(Time::parse(text), Err(FeedError::MalformedTime { .. })),
                "{text:?} should be rejected"
            );
        }
    }
}
