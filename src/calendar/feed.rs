//! The JSON `upcoming-events` feed.

use crate::calendar::{CalendarError, CalendarEvent};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FeedBody {
    events: Vec<FeedEvent>,
}

#[derive(Debug, Deserialize)]
struct FeedEvent {
    title: String,
    date: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    group: Option<String>,
}

/// Parse a feed body into events. Events whose date can't be read are dropped;
/// a body of the wrong shape is an error.
pub fn parse_feed(body: &str, today: NaiveDate) -> Result<Vec<CalendarEvent>, CalendarError> {
    let feed: FeedBody = parse_json_with_context(body)?;

    Ok(feed
        .events
        .into_iter()
        .filter_map(|event| match parse_event_date(&event.date, today.year()) {
            Some(date) => Some(CalendarEvent {
                title: event.title,
                date,
                time: event.time,
                group: event.group,
            }),
            None => {
                debug!(title = %event.title, date = %event.date, "dropping event with unreadable date");
                None
            }
        })
        .collect())
}

/// Read an event date in any of the shapes calendar sources emit:
/// `October 18, 2026`, `Sunday, October 18` (year supplied), or `2026-10-18`.
pub fn parse_event_date(text: &str, year: i32) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%B %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    // weekday-prefixed form carries no year; the weekday is checked against it
    NaiveDate::parse_from_str(&format!("{text} {year}"), "%A, %B %d %Y").ok()
}

/// Deserialize JSON, reporting the failing path and a snippet around the error.
fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, CalendarError> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        let mut detail = String::new();
        if !path.is_empty() && path != "." {
            detail.push_str(&format!("at path '{path}': "));
        }
        detail.push_str(&format!(
            "{msg} (line {line} col {column})\n{}",
            error_snippet(body, line, column, 20)
        ));
        CalendarError::Unparseable(detail)
    })
}

fn error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target: Vec<char> = body
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or("")
        .chars()
        .collect();
    if target.is_empty() {
        return "(empty line)".to_owned();
    }

    let error_idx = column.saturating_sub(1).min(target.len());
    let start = error_idx.saturating_sub(context_len / 2);
    let end = (error_idx + context_len / 2).min(target.len());
    let slice: String = target[start..end].iter().collect();
    let indicator = " ".repeat(error_idx - start) + "^";

    format!("...{slice}...\n   {indicator}")
}
