//! `POST /cookie`: solve the challenge and log in for the calling client.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::middleware::client_ip::ClientIdentity;

#[derive(Deserialize)]
pub struct CookieRequest {
    username: String,
    password: String,
}

/// What a client needs to talk to the portal itself. `error`/`expanded` are
/// set when the portal rejected the credentials; the cookies are still returned.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CookieResponse {
    pub ua: String,
    pub cookie: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<String>,
}

pub(super) async fn issue_cookie(
    State(state): State<AppState>,
    ClientIdentity(identity): ClientIdentity,
    Json(request): Json<CookieRequest>,
) -> Result<Json<CookieResponse>, ApiError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ApiError::credentials_required());
    }

    let session = state
        .pipeline
        .establish_session(&identity, &request.username, &request.password)
        .await
        .map_err(|e| ApiError::from_portal(e, "establish session"))?;

    let (error, expanded) = match session.rejection {
        Some(rejection) => (Some(rejection.code), Some(rejection.expanded)),
        None => (None, None),
    };
    Ok(Json(CookieResponse {
        ua: session.user_agent,
        cookie: session.cookie,
        error,
        expanded,
    }))
}
