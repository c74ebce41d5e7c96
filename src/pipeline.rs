//! The session-acquisition and schedule-synthesis pipeline.
//!
//! Everything outside the core (HTTP handlers, the export job, the terminal
//! printer, the renewal loop) goes through [`Pipeline`].

use crate::calendar::CalendarClient;
use crate::config::Config;
use crate::portal::{
    Authenticator, ChallengeResult, ChallengeSolver, LaunchOptions, LoginOutcome, LoginRejection,
    MatrixScraper, PortalError, PortalUrls,
};
use crate::schedule::{ScheduleMatrix, SynthesizedSchedule, synthesize, synthesize_all};
use crate::session::{Credentials, IdentityKey, SessionRenewer, SessionStore};
use crate::utils::log_if_slow;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

const SLOW_SESSION: Duration = Duration::from_secs(20);

/// A challenge token plus a login attempt, joined the way clients replay them.
#[derive(custom_debug_derive::Debug, Clone, PartialEq, Eq)]
pub struct EstablishedSession {
    pub user_agent: String,
    /// `<challenge cookie>; <login Set-Cookie values>`
    #[debug(with = "crate::fmt::redacted")]
    pub cookie: String,
    pub rejection: Option<LoginRejection>,
}

pub struct Pipeline {
    store: SessionStore,
    challenge: ChallengeSolver,
    auth: Authenticator,
    matrix: MatrixScraper,
    calendar: CalendarClient,
    default_resource_id: String,
}

impl Pipeline {
    pub fn new(config: &Config, store: SessionStore) -> Result<Self, PortalError> {
        let urls = match &config.portal_origin {
            Some(origin) => PortalUrls::with_origin(origin.as_str(), config.guardian),
            None => PortalUrls::new(&config.portal_subdomain, config.guardian),
        };
        let launch = LaunchOptions {
            executable: config.chrome_executable.clone(),
            navigation_timeout: config.navigation_timeout,
        };
        let calendar = CalendarClient::new(
            config.calendar_source,
            &config.calendar_url,
            config.timezone,
        )?;

        Ok(Self {
            challenge: ChallengeSolver::new(urls.clone(), launch.clone(), store.clone()),
            auth: Authenticator::new(urls.clone(), store.clone(), config.navigation_timeout)?,
            matrix: MatrixScraper::new(urls, launch),
            calendar,
            store,
            default_resource_id: config.faculty_resource_id.clone(),
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn timezone(&self) -> Tz {
        self.calendar.timezone()
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.today()
    }

    /// Solve the bot challenge for `identity`.
    pub async fn acquire_session(&self, identity: &IdentityKey) -> Result<ChallengeResult, PortalError> {
        self.challenge.solve(identity).await
    }

    /// Log in with a challenge cookie. A rejection is `Ok` with `rejection` set.
    pub async fn authenticate(
        &self,
        cookie: &str,
        username: &str,
        password: &str,
        identity: &IdentityKey,
    ) -> Result<LoginOutcome, PortalError> {
        self.auth.login(cookie, username, password, identity).await
    }

    /// Challenge then login, serialized per identity.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn establish_session(
        &self,
        identity: &IdentityKey,
        username: &str,
        password: &str,
    ) -> Result<EstablishedSession, PortalError> {
        let lock = self.store.lock(identity);
        let _guard = lock.lock().await;
        let started = Instant::now();

        let challenge = self.acquire_session(identity).await?;
        require_token(&self.store, identity, &challenge, username, password)?;

        let outcome = self
            .authenticate(&challenge.cookie, username, password, identity)
            .await?;
        log_if_slow(started, SLOW_SESSION, "establish session");
        Ok(EstablishedSession {
            user_agent: challenge.user_agent,
            cookie: format!("{}; {}", challenge.cookie, outcome.cookies),
            rejection: outcome.rejection,
        })
    }

    /// Today's schedule, or `None` when the calendar names no day or the
    /// matrix has no row for it.
    #[instrument(skip_all)]
    pub async fn current_schedule(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<SynthesizedSchedule>, PortalError> {
        let today = self.today();
        let Some(day_type) = self.calendar.resolve(today).await? else {
            return Ok(None);
        };

        let matrices = self.raw_matrix(username, password, None).await?;
        let schedule = synthesize(&matrices, &day_type);
        match &schedule {
            Some(_) => info!(day = %day_type.day, schedule_type = %day_type.schedule_type, "schedule synthesized"),
            None => info!(day = %day_type.day, "matrix has no row for today's day"),
        }
        Ok(schedule)
    }

    /// Every matrix day under `variant_label`'s slot table.
    pub async fn all_schedules(
        &self,
        username: &str,
        password: &str,
        variant_label: &str,
    ) -> Result<Vec<SynthesizedSchedule>, PortalError> {
        let matrices = self.raw_matrix(username, password, None).await?;
        Ok(synthesize_all(&matrices, variant_label))
    }

    /// The scraped matrix; `resource_id` falls back to the configured one.
    pub async fn raw_matrix(
        &self,
        username: &str,
        password: &str,
        resource_id: Option<&str>,
    ) -> Result<Vec<ScheduleMatrix>, PortalError> {
        let resource_id = resource_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(self.default_resource_id.as_str());
        debug!(resource_id, "fetching schedule matrix");
        self.matrix.fetch(username, password, resource_id).await
    }
}

/// Reject an empty challenge token. The credentials are remembered first so
/// the renewal loop retries the identity later.
fn require_token(
    store: &SessionStore,
    identity: &IdentityKey,
    challenge: &ChallengeResult,
    username: &str,
    password: &str,
) -> Result<(), PortalError> {
    if !challenge.cookie.is_empty() {
        return Ok(());
    }
    store.record_credentials(identity, Credentials::new(username, password));
    Err(PortalError::ChallengeUnavailable(
        "challenge produced an empty token".to_owned(),
    ))
}

#[async_trait]
impl SessionRenewer for Pipeline {
    async fn renew(&self, identity: &IdentityKey, credentials: &Credentials) -> Result<(), PortalError> {
        let session = self
            .establish_session(identity, &credentials.username, &credentials.password)
            .await?;
        match session.rejection {
            Some(rejection) => Err(PortalError::InvalidCredentials {
                code: rejection.code,
                message: rejection.expanded,
                cookies: session.cookie,
            }),
            None => Ok(()),
        }
    }
}
