//! Reading the lettered day and schedule variant out of calendar titles.

use crate::calendar::CalendarEvent;
use crate::schedule::DayType;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// `F Day`, `F Day (Daily Schedule)`, `a day (X Schedule)`, ...
static DAY_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([A-H])\s+Day(?:\s+\(([^)]+)\))?").unwrap());

const DEFAULT_SCHEDULE_TYPE: &str = "Daily Schedule";

/// Parse a day-type title. The letter is upper-cased; a missing variant means a
/// normal day.
pub fn parse_day_title(title: &str) -> Option<DayType> {
    let captures = DAY_TITLE.captures(title)?;
    Some(DayType {
        day: captures[1].to_uppercase(),
        schedule_type: captures
            .get(2)
            .map_or(DEFAULT_SCHEDULE_TYPE, |m| m.as_str())
            .to_owned(),
    })
}

/// The first day-type event dated `today`, in feed order.
pub fn match_day_type(events: &[CalendarEvent], today: NaiveDate) -> Option<DayType> {
    let mut matches = events
        .iter()
        .filter(|event| event.date == today)
        .filter_map(|event| parse_day_title(&event.title).map(|day| (event, day)));

    let (event, day_type) = matches.next()?;
    debug!(title = %event.title, day = %day_type.day, schedule_type = %day_type.schedule_type, "resolved day type");
    for (ignored, _) in matches {
        debug!(title = %ignored.title, "ignoring additional day-type event for today");
    }
    Some(day_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, date: NaiveDate) -> CalendarEvent {
        CalendarEvent {
            title: title.to_owned(),
            date,
            time: "All Day".to_owned(),
            group: None,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[test]
    fn test_f_day_with_variant() {
        let events = [event("F Day (Daily Schedule)", date(18))];
        let day_type = match_day_type(&events, date(18)).unwrap();
        assert_eq!(day_type.day, "F");
        assert_eq!(day_type.schedule_type, "Daily Schedule");
    }

    #[test]
    fn test_default_schedule_type() {
        let events = [event("b day", date(18))];
        let day_type = match_day_type(&events, date(18)).unwrap();
        assert_eq!(day_type.day, "B");
        assert_eq!(day_type.schedule_type, "Daily Schedule");
    }

    #[test]
    fn test_other_dates_ignored() {
        let events = [event("A Day (X Schedule)", date(17)), event("C Day", date(19))];
        assert!(match_day_type(&events, date(18)).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let events = [
            event("Homecoming", date(18)),
            event("D Day (Morning Meeting)", date(18)),
            event("E Day", date(18)),
        ];
        let day_type = match_day_type(&events, date(18)).unwrap();
        assert_eq!(day_type.day, "D");
        assert_eq!(day_type.schedule_type, "Morning Meeting");
    }

    #[test]
    fn test_parse_day_title_rejects_non_day_titles() {
        assert!(parse_day_title("I Day").is_none());
        assert!(parse_day_title("Field Day").is_none());
        assert!(parse_day_title("Sunday").is_none());
        assert!(parse_day_title("AB Day").is_none());
    }
}
