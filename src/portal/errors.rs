//! Error types for the portal client.

use crate::calendar::CalendarError;

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// The landing page carried no challenge script, or solving it produced nothing usable.
    #[error("bot challenge unavailable: {0}")]
    ChallengeUnavailable(String),
    /// The portal rendered more than one feedback alert after the login POST.
    #[error("{code}: {message}")]
    InvalidCredentials {
        code: String,
        message: String,
        /// Cookies the portal set anyway; callers may still want them.
        cookies: String,
    },
    /// Browser-driven login never left the login page.
    #[error("portal login failed: {0}")]
    LoginFailed(String),
    #[error("schedule matrix table not found in portal response")]
    MatrixNotFound,
    #[error("portal unreachable")]
    UpstreamUnreachable(#[source] anyhow::Error),
}

impl PortalError {
    pub fn upstream(error: impl Into<anyhow::Error>) -> Self {
        Self::UpstreamUnreachable(error.into())
    }

    /// Short machine-readable code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChallengeUnavailable(_) => "ChallengeUnavailable",
            Self::InvalidCredentials { .. } => "InvalidCredentials",
            Self::LoginFailed(_) => "LoginFailed",
            Self::MatrixNotFound => "MatrixNotFound",
            Self::UpstreamUnreachable(_) => "UpstreamUnreachable",
        }
    }
}

impl From<CalendarError> for PortalError {
    fn from(error: CalendarError) -> Self {
        Self::UpstreamUnreachable(anyhow::Error::new(error))
    }
}

impl From<chromiumoxide::error::CdpError> for PortalError {
    fn from(error: chromiumoxide::error::CdpError) -> Self {
        Self::UpstreamUnreachable(anyhow::Error::new(error).context("browser automation failed"))
    }
}
