use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer};

use crate::{read_rows, record_problem, FeedError, ServiceID};

/// Resolves which services run on a date. Two layers, always evaluated in this order: the weekly
/// rule per service, then per-date exceptions that override it.
pub struct Calendar {
    pub services: BTreeMap<ServiceID, Service>,
    pub exceptions: BTreeMap<NaiveDate, BTreeMap<ServiceID, ExceptionType>>,
}

pub struct Service {
    pub service_id: ServiceID,
    pub days_of_week: DaysOfWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionType {
    Added,
    Removed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DaysOfWeek {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl Calendar {
    pub fn empty() -> Self {
        Self {
            services: BTreeMap::new(),
            exceptions: BTreeMap::new(),
        }
    }

    /// Fails only if the feed defines no calendar at all. A date where nothing runs is just an
    /// empty set.
    pub fn active_services(&self, date: NaiveDate) -> Result<BTreeSet<ServiceID>, FeedError> {
        if self.services.is_empty() && self.exceptions.is_empty() {
            return Err(FeedError::NoServiceData);
        }

        let mut active: BTreeSet<ServiceID> = self
            .services
            .values()
            .filter(|service| service.weekly_rule_matches(date))
            .map(|service| service.service_id.clone())
            .collect();

        if let Some(exceptions) = self.exceptions.get(&date) {
            for (service_id, exception) in exceptions {
                match exception {
                    ExceptionType::Added => {
                        active.insert(service_id.clone());
                    }
                    ExceptionType::Removed => {
                        active.remove(service_id);
                    }
                }
            }
        }
        Ok(active)
    }
}

impl Service {
    pub fn weekly_rule_matches(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date && self.days_of_week.includes(date)
    }
}

impl DaysOfWeek {
    pub fn describe(&self) -> String {
        let weekdays = [
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
        ]
        .into_iter()
        .filter(|x| *x)
        .count();
        let weekends = [self.saturday, self.sunday]
            .into_iter()
            .filter(|x| *x)
            .count();
        if weekdays + weekends == 7 {
            return "every day".to_string();
        }
        if weekdays == 5 && weekends == 0 {
            return "weekdays".to_string();
        }
        if weekdays == 0 && weekends == 2 {
            return "weekends".to_string();
        }
        if weekdays == 0 && weekends == 0 {
            return "only on exception dates".to_string();
        }
        let mut result = String::new();
        for (day, operates) in [
            ("M", self.monday),
            ("T", self.tuesday),
            ("W", self.wednesday),
            ("Th", self.thursday),
            ("F", self.friday),
            ("Sat", self.saturday),
            ("Sun", self.sunday),
        ] {
            if operates {
                result.push_str(day);
            }
        }
        result
    }

    pub fn includes(&self, day: NaiveDate) -> bool {
        match day.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

pub fn load<R: std::io::Read>(calendar: &mut Calendar, reader: R, problems: &mut Vec<FeedError>) {
    for rec in read_rows::<_, Record>(reader, "calendar.txt", problems) {
        let (start_date, end_date) = match (parse_date(&rec.start_date), parse_date(&rec.end_date))
        {
            (Some(start), Some(end)) => (start, end),
            _ => {
                record_problem(
                    problems,
                    FeedError::MalformedRow {
                        file: "calendar.txt".to_string(),
                        reason: format!(
                            "{:?} has bad dates {:?} to {:?}",
                            rec.service_id, rec.start_date, rec.end_date
                        ),
                    },
                );
                continue;
            }
        };
        if calendar.services.contains_key(&rec.service_id) {
            record_problem(
                problems,
                FeedError::MalformedRow {
                    file: "calendar.txt".to_string(),
                    reason: format!("duplicate {:?}", rec.service_id),
                },
            );
            continue;
        }
        calendar.services.insert(
            rec.service_id.clone(),
            Service {
                service_id: rec.service_id,
                days_of_week: DaysOfWeek {
                    monday: rec.monday,
                    tuesday: rec.tuesday,
                    wednesday: rec.wednesday,
                    thursday: rec.thursday,
                    friday: rec.friday,
                    saturday: rec.saturday,
                    sunday: rec.sunday,
                },
                start_date,
                end_date,
            },
        );
    }
}

/// Exceptions may name services absent from calendar.txt; that's how calendar_dates-only feeds
/// work. If one date has both kinds for the same service, removal wins, regardless of row order.
pub fn load_exceptions<R: std::io::Read>(
    calendar: &mut Calendar,
    reader: R,
    problems: &mut Vec<FeedError>,
) {
    for rec in read_rows::<_, DateRecord>(reader, "calendar_dates.txt", problems) {
        let date = if let Some(x) = parse_date(&rec.date) {
            x
        } else {
            record_problem(
                problems,
                FeedError::MalformedRow {
                    file: "calendar_dates.txt".to_string(),
                    reason: format!("{:?} has bad date {:?}", rec.service_id, rec.date),
                },
            );
            continue;
        };
        let exception = match rec.exception_type {
            1 => ExceptionType::Added,
            2 => ExceptionType::Removed,
            x => {
                record_problem(
                    problems,
                    FeedError::MalformedRow {
                        file: "calendar_dates.txt".to_string(),
                        reason: format!("unknown exception_type {x}"),
                    },
                );
                continue;
            }
        };
        let entry = calendar
            .exceptions
            .entry(date)
            .or_insert_with(BTreeMap::new)
            .entry(rec.service_id)
            .or_insert(exception);
        if exception == ExceptionType::Removed {
            *entry = ExceptionType::Removed;
        }
    }
}

fn parse_date(x: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(x, "%Y%m%d").ok()
}

#[derive(Deserialize)]
struct Record {
    service_id: ServiceID,
    #[serde(deserialize_with = "parse_bool")]
    monday: bool,
    #[serde(deserialize_with = "parse_bool")]
    tuesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    wednesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    thursday: bool,
    #[serde(deserialize_with = "parse_bool")]
    friday: bool,
    #[serde(deserialize_with = "parse_bool")]
    saturday: bool,
    #[serde(deserialize_with = "parse_bool")]
    sunday: bool,
    start_date: String,
    end_date: String,
}

fn parse_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let n = <u8>::deserialize(d)?;
    if n == 1 {
        return Ok(true);
    }
    if n == 0 {
        return Ok(false);
    }
    Err(serde::de::Error::custom(format!("Unknown bool value {n}")))
}

#[derive(Deserialize)]
struct DateRecord {
    service_id: ServiceID,
    date: String,
    exception_type: u8,
}
