//! Finalsite calendar page scraping.

use crate::calendar::CalendarEvent;
use chrono::{Datelike, NaiveDate};
use html_scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

const GROUP: &str = "School Calendar";
const ALL_DAY: &str = "All Day";

static DAYBOX: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.fsCalendarDaybox").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.fsCalendarDate").unwrap());
static INFO: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.fsCalendarInfo").unwrap());
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.fsCalendarEventTitle").unwrap());
static TIME_RANGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.fsTimeRange").unwrap());
static ALL_DAY_MARKER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.fsAllDayEvent").unwrap());
static START_TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time.fsStartTime").unwrap());

/// Date of a daybox from its `data-*` attributes (`data-month` is zero-based).
fn daybox_date(daybox: &ElementRef<'_>) -> Option<NaiveDate> {
    let date = daybox.select(&DATE).next()?.value();
    let attr = |name: &str| date.attr(name).and_then(|v| v.trim().parse::<i64>().ok());

    let year = i32::try_from(attr("data-year")?).ok()?;
    let month = u32::try_from(attr("data-month")? + 1).ok()?;
    let day = u32::try_from(attr("data-day")?).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn event_time(info: &ElementRef<'_>) -> String {
    let Some(range) = info.select(&TIME_RANGE).next() else {
        return ALL_DAY.to_owned();
    };
    if range.select(&ALL_DAY_MARKER).next().is_some() {
        return ALL_DAY.to_owned();
    }
    range
        .select(&START_TIME)
        .next()
        .map(|start| text(&start))
        .unwrap_or_else(|| ALL_DAY.to_owned())
}

/// Events on the page from `today` to the end of its month.
pub fn parse_calendar_page(html: &str, today: NaiveDate) -> Vec<CalendarEvent> {
    let document = Html::parse_document(html);
    let mut events = Vec::new();

    for daybox in document.select(&DAYBOX) {
        let Some(date) = daybox_date(&daybox) else {
            continue;
        };
        if date.year() != today.year() || date.month() != today.month() || date < today {
            continue;
        }

        for info in daybox.select(&INFO) {
            let Some(link) = info.select(&TITLE).next() else {
                continue;
            };
            let title = link
                .value()
                .attr("title")
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| text(&link));
            if title.is_empty() {
                continue;
            }

            events.push(CalendarEvent {
                title,
                date,
                time: event_time(&info),
                group: Some(GROUP.to_owned()),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daybox(year: i32, month0: u32, day: u32, infos: &str) -> String {
        format!(
            r#"<div class="fsCalendarDaybox">
                <div class="fsCalendarDate" data-day="{day}" data-month="{month0}" data-year="{year}"></div>
                {infos}
            </div>"#
        )
    }

    fn info(title_attr: Option<&str>, text: &str, time: &str) -> String {
        let attr = title_attr.map(|t| format!(r#" title="{t}""#)).unwrap_or_default();
        format!(
            r#"<div class="fsCalendarInfo"><a class="fsCalendarEventTitle"{attr}>{text}</a>{time}</div>"#
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_parse_events() {
        let html = format!(
            "<html><body>{}{}</body></html>",
            daybox(
                2026,
                9,
                18,
                &info(
                    Some("F Day (Daily Schedule)"),
                    "F Day",
                    r#"<div class="fsTimeRange"><span class="fsAllDayEvent">All Day</span></div>"#
                )
            ),
            daybox(
                2026,
                9,
                20,
                &info(
                    None,
                    " Soccer vs. CR ",
                    r#"<div class="fsTimeRange"><time class="fsStartTime">3:30 PM</time></div>"#
                )
            ),
        );
        let events = parse_calendar_page(&html, today());
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].title, "F Day (Daily Schedule)");
        assert_eq!(events[0].date, today());
        assert_eq!(events[0].time, "All Day");

        assert_eq!(events[1].title, "Soccer vs. CR");
        assert_eq!(events[1].time, "3:30 PM");
        assert_eq!(events[1].group.as_deref(), Some("School Calendar"));
    }

    #[test]
    fn test_past_and_other_month_days_skipped() {
        let html = [
            daybox(2026, 9, 17, &info(Some("E Day"), "", "")),
            daybox(2026, 10, 2, &info(Some("A Day"), "", "")),
            daybox(2025, 9, 20, &info(Some("B Day"), "", "")),
            daybox(2026, 9, 31, &info(Some("C Day"), "", "")),
        ]
        .concat();
        let events = parse_calendar_page(&html, today());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "C Day");
        // no time range means all day
        assert_eq!(events[0].time, "All Day");
    }

    #[test]
    fn test_malformed_dayboxes_skipped() {
        let html = r#"
            <div class="fsCalendarDaybox"><div class="fsCalendarDate" data-day="x" data-month="9" data-year="2026"></div></div>
            <div class="fsCalendarDaybox"><div class="fsCalendarInfo"><a class="fsCalendarEventTitle">A Day</a></div></div>
            <div class="fsCalendarDaybox"><div class="fsCalendarDate" data-day="18" data-month="9" data-year="2026"></div>
                <div class="fsCalendarInfo"><span>no link</span></div>
                <div class="fsCalendarInfo"><a class="fsCalendarEventTitle"> </a></div>
            </div>"#;
        assert!(parse_calendar_page(html, today()).is_empty());
    }
}
