//! Schedule matrix scraping.
//!
//! The matrix is only reachable behind a browser login, so [`MatrixScraper`]
//! drives a whole Chromium session per call. Parsing the returned table is
//! pure and lives in [`parse_matrix`].

use crate::portal::PortalUrls;
use crate::portal::agent::assign_fingerprint;
use crate::portal::browser::{BrowserSession, LaunchOptions};
use crate::portal::errors::PortalError;
use crate::schedule::{Course, ScheduleMatrix};
use crate::utils::{fmt_duration, unix_millis};
use html_scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// `<td>` cells in front of the first period column (term and expression
/// columns). A cell at zero-based index `i` is period `i + 1 - LEADING_TERM_CELLS`.
pub const LEADING_TERM_CELLS: usize = 2;

/// Highest period number the matrix can carry.
pub const MAX_PERIOD: u8 = 10;

/// Classes PowerSchool puts on occupied matrix cells.
const COURSE_CELL_CLASSES: [&str; 7] = [
    "matrix_1", "matrix_2", "matrix_3", "matrix_4", "matrix_5", "matrix_6", "matrix_7",
];

const LOGIN_FORM_ID: &str = "s-user-login-form";
const LOGIN_FORM_TIMEOUT: Duration = Duration::from_secs(10);
const SUBMIT_SELECTOR: &str =
    "#s-user-login-form input[type=\"submit\"], #s-user-login-form button[type=\"submit\"]";

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#schedMatrixTable").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static DAY_HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"th.header[scope="rowgroup"]"#).unwrap());
static COURSE_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sched-course-name").unwrap());
static SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sched-section-number span").unwrap());
static ROOM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sched-room span:last-child").unwrap());
static CAPACITY: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".sched-cap").unwrap());

/// Map a cell's zero-based position among its row's `<td>`s to a period.
/// Positions outside 1..=10 yield `None`; nothing is clamped or wrapped.
pub fn period_for_cell_index(index: usize) -> Option<u8> {
    let period = (index + 1).checked_sub(LEADING_TERM_CELLS)?;
    u8::try_from(period)
        .ok()
        .filter(|p| (1..=MAX_PERIOD).contains(p))
}

fn text_of(cell: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    cell.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_owned())
}

fn is_course_cell(cell: &ElementRef<'_>) -> bool {
    cell.value()
        .classes()
        .any(|class| COURSE_CELL_CLASSES.contains(&class))
}

fn parse_course(cell: &ElementRef<'_>) -> Option<Course> {
    let name = text_of(cell, &COURSE_NAME).filter(|name| !name.is_empty())?;
    Some(Course {
        name,
        section: text_of(cell, &SECTION).unwrap_or_default(),
        room: text_of(cell, &ROOM).unwrap_or_default(),
        capacity: text_of(cell, &CAPACITY).unwrap_or_default(),
    })
}

/// Parse the `#schedMatrixTable` fragment into one matrix per day letter.
pub fn parse_matrix(html: &str) -> Result<Vec<ScheduleMatrix>, PortalError> {
    let document = Html::parse_document(html);
    let table = document
        .select(&TABLE)
        .next()
        .ok_or(PortalError::MatrixNotFound)?;

    let mut matrices = Vec::new();
    // first row is the column header
    for row in table.select(&ROW).skip(1) {
        let Some(header) = row.select(&DAY_HEADER).next() else {
            continue;
        };
        let day = header.text().collect::<String>().trim().to_owned();

        let mut periods = BTreeMap::new();
        for (index, cell) in row.select(&CELL).enumerate() {
            if !is_course_cell(&cell) {
                continue;
            }
            let Some(course) = parse_course(&cell) else {
                continue;
            };
            match period_for_cell_index(index) {
                Some(period) => {
                    periods.insert(period, course);
                }
                None => {
                    trace!(day = %day, index, course = %course.name, "course cell outside period range")
                }
            }
        }

        debug!(day = %day, courses = periods.len(), "parsed matrix day");
        matrices.push(ScheduleMatrix { day, periods });
    }

    Ok(matrices)
}

/// Logs into the portal in a browser and pulls the schedule matrix.
#[derive(Clone)]
pub struct MatrixScraper {
    urls: PortalUrls,
    launch: LaunchOptions,
}

impl MatrixScraper {
    pub fn new(urls: PortalUrls, launch: LaunchOptions) -> Self {
        Self { urls, launch }
    }

    pub async fn fetch(
        &self,
        username: &str,
        password: &str,
        resource_id: &str,
    ) -> Result<Vec<ScheduleMatrix>, PortalError> {
        let started = Instant::now();
        let session = BrowserSession::launch(&self.launch, assign_fingerprint()).await?;
        let html = self.fetch_html(&session, username, password, resource_id).await;
        session.close().await;

        let matrices = parse_matrix(&html?)?;
        info!(
            days = matrices.len(),
            elapsed = fmt_duration(started.elapsed()),
            "schedule matrix fetched"
        );
        Ok(matrices)
    }

    async fn fetch_html(
        &self,
        session: &BrowserSession,
        username: &str,
        password: &str,
        resource_id: &str,
    ) -> Result<String, PortalError> {
        session.goto(&self.urls.landing()).await?;
        session.wait_for_network_idle().await?;
        self.submit_login(session, username, password).await?;
        verify_logged_in(session).await?;

        let url = self
            .urls
            .schedule_matrix(resource_id, unix_millis())
            .map_err(PortalError::upstream)?;
        debug!(resource_id, "navigating to schedule matrix");
        session.goto(url.as_str()).await?;
        session.wait_for_network_idle().await?;
        session.content().await
    }

    async fn submit_login(
        &self,
        session: &BrowserSession,
        username: &str,
        password: &str,
    ) -> Result<(), PortalError> {
        let form = session
            .wait_for_element(&format!("#{LOGIN_FORM_ID}"), LOGIN_FORM_TIMEOUT)
            .await?;
        let page = session.page();

        page.find_element(r#"input[name="mail"]"#)
            .await?
            .click()
            .await?
            .type_str(username)
            .await?;
        page.find_element(r#"input[name="pass"]"#)
            .await?
            .click()
            .await?
            .type_str(password)
            .await?;

        // replay any other prefilled fields the form declares
        for input in form.find_elements("input").await? {
            let Some(name) = input.attribute("name").await? else {
                continue;
            };
            if name == "mail" || name == "pass" {
                continue;
            }
            let value = input.attribute("value").await?.unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            if let Err(e) = input.type_str(&value).await {
                trace!(field = %name, error = %e, "could not replay form field");
            }
        }

        page.find_element(SUBMIT_SELECTOR).await?.click().await?;
        session.wait_for_navigation().await
    }
}

/// Fail unless the browser has left the login page.
async fn verify_logged_in(session: &BrowserSession) -> Result<(), PortalError> {
    let url = session.current_url().await?;
    let content = session.content().await?;
    login_failure_reason(&url, &content).map_or(Ok(()), |reason| {
        warn!(reason, "portal login did not complete");
        Err(PortalError::LoginFailed(reason.to_owned()))
    })
}

fn login_failure_reason(url: &str, content: &str) -> Option<&'static str> {
    if content.contains("Invalid username or password") {
        Some("invalid username or password")
    } else if url.to_lowercase().contains("login") {
        Some("still on a login URL")
    } else if content.contains(LOGIN_FORM_ID) {
        Some("login form still present")
    } else {
        None
    }
}
