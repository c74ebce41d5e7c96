//! Schedule data model, the static slot tables, and synthesis.

pub mod slots;
pub mod synth;

pub use slots::{PERIODS_PER_DAY, ScheduleVariant, Slot};
pub use synth::{synthesize, synthesize_all};

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

/// One scheduled class as scraped from the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub name: String,
    pub section: String,
    pub room: String,
    pub capacity: String,
}

/// A weekday letter's courses, keyed by period 1..=10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleMatrix {
    pub day: String,
    pub periods: BTreeMap<u8, Course>,
}

/// Which lettered day it is today and the free-text variant the calendar named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayType {
    pub day: String,
    pub schedule_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulePeriod {
    pub period: u8,
    pub course: Option<Course>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SchedulePeriod {
    /// `"Period N: <course>"`, or `"Period N"` when free.
    pub fn display_name(&self) -> String {
        match &self.course {
            Some(course) => format!("Period {}: {}", self.period, course.name),
            None => format!("Period {}", self.period),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedSchedule {
    pub day: String,
    pub schedule_type: String,
    pub periods: Vec<SchedulePeriod>,
}

/// Wire shape of a schedule pinned to a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSchedule {
    pub day: String,
    pub schedule_type: String,
    pub periods: Vec<ExportedPeriod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedPeriod {
    pub name: String,
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<Course>,
}

impl ExportedSchedule {
    /// Place every slot on `date` in `tz` and render the instants as UTC ISO 8601.
    pub fn on_date(schedule: &SynthesizedSchedule, date: NaiveDate, tz: Tz) -> Self {
        let periods = schedule
            .periods
            .iter()
            .map(|period| ExportedPeriod {
                name: period.display_name(),
                start: iso_instant(date, period.start, tz),
                end: iso_instant(date, period.end, tz),
                course: period.course.clone(),
            })
            .collect();

        Self {
            day: schedule.day.clone(),
            schedule_type: schedule.schedule_type.clone(),
            periods,
        }
    }
}

/// Local wall-clock time on `date` as a UTC instant. Times skipped by a DST
/// jump are read as UTC rather than failing.
pub fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn iso_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> String {
    localize(date, time, tz).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> SynthesizedSchedule {
        let mut periods = BTreeMap::new();
        periods.insert(
            1,
            Course {
                name: "Theology".to_owned(),
                section: "3".to_owned(),
                room: "101".to_owned(),
                capacity: "20".to_owned(),
            },
        );
        let matrix = ScheduleMatrix {
            day: "F".to_owned(),
            periods,
        };
        let day = DayType {
            day: "F".to_owned(),
            schedule_type: "Daily Schedule".to_owned(),
        };
        synthesize(&[matrix], &day).unwrap()
    }

    #[test]
    fn test_export_names_and_instants() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let exported = ExportedSchedule::on_date(&schedule(), date, chrono_tz::America::New_York);

        assert_eq!(exported.periods.len(), 10);
        assert_eq!(exported.periods[0].name, "Period 1: Theology");
        assert_eq!(exported.periods[1].name, "Period 2");
        // 08:00 EDT
        assert_eq!(exported.periods[0].start, "2026-10-19T12:00:00.000Z");
        assert_eq!(exported.periods[0].end, "2026-10-19T12:40:00.000Z");
    }

    #[test]
    fn test_export_json_shape() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 12).unwrap();
        let exported = ExportedSchedule::on_date(&schedule(), date, chrono_tz::America::New_York);
        let json = serde_json::to_value(&exported).unwrap();

        assert_eq!(json["day"], "F");
        assert_eq!(json["scheduleType"], "Daily Schedule");
        // 08:00 EST
        assert_eq!(json["periods"][0]["start"], "2026-01-12T13:00:00.000Z");
        assert_eq!(json["periods"][0]["course"]["room"], "101");
        assert!(json["periods"][1].get("course").is_none());
    }
}
