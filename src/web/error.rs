//! API error responses.

use crate::portal::PortalError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ApiErrorCode {
    CredentialsRequired,
    InvalidCredentials,
    ScheduleUnknown,
    UpstreamFailure,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            Self::CredentialsRequired => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::ScheduleUnknown => StatusCode::NOT_FOUND,
            Self::UpstreamFailure => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub code: ApiErrorCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, error: impl Into<String>) -> Self {
        Self {
            code,
            error: error.into(),
            expanded: None,
        }
    }

    pub fn credentials_required() -> Self {
        Self::new(ApiErrorCode::CredentialsRequired, "Username and password required")
    }

    pub fn schedule_unknown() -> Self {
        Self::new(ApiErrorCode::ScheduleUnknown, "Could not determine current schedule")
    }

    /// Map a pipeline failure. Credential rejections (from the login POST or the
    /// browser login) are described to the caller; everything else is logged
    /// and reported generically.
    pub fn from_portal(error: PortalError, what: &str) -> Self {
        match error {
            PortalError::InvalidCredentials { code, message, .. } => {
                warn!(code = %code, "portal rejected credentials");
                Self {
                    code: ApiErrorCode::InvalidCredentials,
                    error: code,
                    expanded: Some(message),
                }
            }
            PortalError::LoginFailed(reason) => {
                warn!(reason = %reason, "portal login did not complete");
                Self {
                    code: ApiErrorCode::InvalidCredentials,
                    error: "Invalid".to_owned(),
                    expanded: Some(format!("Portal login did not complete: {reason}")),
                }
            }
            other => {
                error!(error = ?other, kind = other.code(), "{what} failed");
                Self::new(ApiErrorCode::UpstreamFailure, format!("could not {what}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}
