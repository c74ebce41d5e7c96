//! Client for the school-management portal: bot challenge, login, and the
//! schedule matrix scrape.

pub mod agent;
pub mod auth;
pub mod browser;
pub mod challenge;
pub mod errors;
pub mod matrix;

pub use auth::{Authenticator, LoginOutcome, LoginRejection};
pub use browser::{BrowserSession, LaunchOptions, ScriptRunner};
pub use challenge::{ChallengeResult, ChallengeSolver};
pub use errors::PortalError;
pub use matrix::MatrixScraper;

/// URL builder for one portal tenant.
#[derive(Debug, Clone)]
pub struct PortalUrls {
    origin: String,
    guardian: bool,
}

impl PortalUrls {
    /// The hosted tenant at `https://<subdomain>.powerschool.com`.
    pub fn new(subdomain: &str, guardian: bool) -> Self {
        Self::with_origin(format!("https://{subdomain}.powerschool.com"), guardian)
    }

    /// A portal served from an arbitrary origin, e.g. `http://127.0.0.1:8080`.
    pub fn with_origin(origin: impl Into<String>, guardian: bool) -> Self {
        let origin = origin.into().trim_end_matches('/').to_owned();
        Self { origin, guardian }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Public landing page that serves the bot challenge and the login form.
    pub fn landing(&self) -> String {
        let area = if self.guardian { "public" } else { "teachers" };
        format!("{}/{area}/", self.origin())
    }

    /// Target of the credential POST.
    pub fn login_post(&self) -> String {
        let area = if self.guardian { "guardian" } else { "teachers" };
        format!("{}/{area}/home.html", self.origin())
    }

    /// Schedule matrix fragment for a faculty resource, cache-busted with `timestamp_ms`.
    pub fn schedule_matrix(&self, resource_id: &str, timestamp_ms: i64) -> anyhow::Result<url::Url> {
        let mut url = url::Url::parse(&format!(
            "{}/teachers/schedulematrix_content.html",
            self.origin()
        ))?;
        url.query_pairs_mut()
            .append_pair("frn", resource_id)
            .append_pair("includeCoTeachSections", "1")
            .append_pair("showOnlyActiveRole", "1")
            .append_pair("_", &timestamp_ms.to_string());
        Ok(url)
    }
}
