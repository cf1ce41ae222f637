use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{read_rows, record_problem, FeedError, StopID, Time, TripID};

/// One scheduled visit of a trip to a stop
#[derive(Clone, Debug, PartialEq)]
pub struct StopTime {
    pub stop_sequence: u32,
    pub stop_id: StopID,
    pub arrival_time: Time,
    pub departure_time: Time,
}

/// Rows with unusable times are skipped. Duplicate or inconsistent sequences are left for the
/// caller to judge, since that depends on the rest of the trip.
pub fn load<R: std::io::Read>(
    reader: R,
    problems: &mut Vec<FeedError>,
) -> BTreeMap<TripID, Vec<StopTime>> {
    let mut stop_times: BTreeMap<TripID, Vec<StopTime>> = BTreeMap::new();
    for rec in read_rows::<_, Record>(reader, "stop_times.txt", problems) {
        let (arrival_time, departure_time) = match parse_times(&rec) {
            Ok(pair) => pair,
            Err(err) => {
                record_problem(problems, err);
                continue;
            }
        };
        stop_times
            .entry(rec.trip_id)
            .or_insert_with(Vec::new)
            .push(StopTime {
                stop_sequence: rec.stop_sequence,
                stop_id: rec.stop_id,
                arrival_time,
                departure_time,
            });
    }

    // Sort by stop_sequence, in case the file isn't in order. The sort is stable, so duplicates
    // keep file order.
    for list in stop_times.values_mut() {
        list.sort_by_key(|st| st.stop_sequence);
    }
    stop_times
}

// Untimed stops may leave one or both times blank. With one present, use it for both.
fn parse_times(rec: &Record) -> Result<(Time, Time), FeedError> {
    let arrival = rec.arrival_time.as_deref().unwrap_or("");
    let departure = rec.departure_time.as_deref().unwrap_or("");
    let (arrival, departure) = match (arrival.is_empty(), departure.is_empty()) {
        (false, false) => (Time::parse(arrival)?, Time::parse(departure)?),
        (false, true) => {
            let t = Time::parse(arrival)?;
            (t, t)
        }
        (true, false) => {
            let t = Time::parse(departure)?;
            (t, t)
        }
        (true, true) => {
            return Err(FeedError::malformed_time(
                "",
                format!(
                    "{:?} has no times at stop_sequence {}",
                    rec.trip_id, rec.stop_sequence
                ),
            ));
        }
    };
    if arrival > departure {
        return Err(FeedError::malformed_time(
            &departure.to_string(),
            format!(
                "{:?} departs before arriving ({arrival}) at stop_sequence {}",
                rec.trip_id, rec.stop_sequence
            ),
        ));
    }
    Ok((arrival, departure))
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    #[serde(default)]
    arrival_time: Option<String>,
    #[serde(default)]
    departure_time: Option<String>,
    stop_id: StopID,
    stop_sequence: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_skips_bad_times() {
        let input = "trip_id,arrival_time,departure_time,stop_id,stop_sequence
T1,24:10:00,24:10:30,C,3
T1,23:55:00,23:55:00,A,1
T1,,,B,2
T1,24:20:00,,D,4
T2,08:00:00,07:59:00,A,1
T2,8:xx:00,08:01:00,B,2
";
        let mut problems = Vec::new();
        let stop_times = load(input.as_bytes(), &mut problems);
        assert_eq!(problems.len(), 3);
        assert!(problems
            .iter()
            .all(|p| matches!(p, FeedError::MalformedTime { .. })));
        assert!(!stop_times.contains_key(&TripID::new("T2")));

        let t1 = &stop_times[&TripID::new("T1")];
        let stops: Vec<&str> = t1.iter().map(|st| st.stop_id.as_str()).collect();
        assert_eq!(stops, vec!["A", "C", "D"]);
        assert_eq!(t1[1].departure_time.inner_seconds(), 87030);
        assert_eq!(t1[2].arrival_time, t1[2].departure_time);
    }
}
