//! Day-type resolution from the school calendar.

pub mod day_type;
pub mod feed;
pub mod html;

use crate::config::CalendarSource;
use crate::schedule::DayType;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CALENDAR_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:104.0) Gecko/20100101 Firefox/104.0";

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar unreachable")]
    Unreachable(#[source] reqwest::Error),
    #[error("calendar response unparseable: {0}")]
    Unparseable(String),
}

/// One calendar entry, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub group: Option<String>,
}

/// Fetches calendar events from the configured source.
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    source: CalendarSource,
    url: String,
    timezone: Tz,
}

impl CalendarClient {
    pub fn new(source: CalendarSource, url: impl Into<String>, timezone: Tz) -> Result<Self, CalendarError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(CALENDAR_USER_AGENT)
            .build()
            .map_err(CalendarError::Unreachable)?;
        Ok(Self {
            http,
            source,
            url: url.into(),
            timezone,
        })
    }

    /// Today's date in the school's timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn endpoint(&self) -> String {
        match self.source {
            CalendarSource::Feed => format!("{}/upcoming-events", self.url.trim_end_matches('/')),
            CalendarSource::Html => self.url.clone(),
        }
    }

    pub async fn fetch_events(&self, today: NaiveDate) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = self.endpoint();
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(CalendarError::Unreachable)?
            .text()
            .await
            .map_err(CalendarError::Unreachable)?;

        let events = match self.source {
            CalendarSource::Feed => feed::parse_feed(&body, today)?,
            CalendarSource::Html => html::parse_calendar_page(&body, today),
        };
        debug!(url = %url, count = events.len(), "calendar events fetched");
        Ok(events)
    }

    /// The day type in effect on `today`, or `None` if the calendar doesn't say.
    pub async fn resolve(&self, today: NaiveDate) -> Result<Option<DayType>, CalendarError> {
        let events = self.fetch_events(today).await?;
        let day_type = day_type::match_day_type(&events, today);
        if day_type.is_none() {
            info!(%today, "no day-type event on the calendar today");
        }
        Ok(day_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_per_source() {
        let feed = CalendarClient::new(CalendarSource::Feed, "http://localhost:8000/", chrono_tz::UTC).unwrap();
        assert_eq!(feed.endpoint(), "http://localhost:8000/upcoming-events");

        let page = CalendarClient::new(
            CalendarSource::Html,
            "https://www.holyghostprep.org/calendar-header/",
            chrono_tz::UTC,
        )
        .unwrap();
        assert_eq!(page.endpoint(), "https://www.holyghostprep.org/calendar-header/");
    }
}
