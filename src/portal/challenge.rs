//! Bot-challenge solving.
//!
//! The portal embeds its anti-bot challenge as the first inline `<script>` in
//! the document head. Running that script in the page's own global scope
//! installs a solver callable (`window.reese84`) that hands back the token;
//! when it doesn't, the token ends up in the document cookie jar instead.

use crate::portal::browser::{BrowserSession, LaunchOptions, ScriptRunner};
use crate::portal::errors::PortalError;
use crate::portal::PortalUrls;
use crate::session::{IdentityKey, SessionStore};
use crate::utils::fmt_duration;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the head challenge script and reports where the token came from.
const HARVEST_SCRIPT: &str = r#"(() => {
    const script = document.head ? document.head.getElementsByTagName("script")[0] : undefined;
    if (!script) {
        return { source: "missing" };
    }
    (new Function(script.innerHTML)).bind(window)();
    const solver = window.reese84;
    if (typeof solver === "function") {
        const token = solver();
        if (token) {
            return { source: "token", value: String(token) };
        }
    }
    return { source: "cookie", value: document.cookie || "" };
})()"#;

/// What the in-page harvest produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "lowercase")]
pub enum Harvest {
    /// The installed solver returned a token directly.
    Token(String),
    /// No solver token; this is whatever the cookie jar holds (may be empty).
    Cookie(String),
    /// The document head had no script to run.
    Missing,
}

/// Token and the exact user-agent that earned it.
#[derive(custom_debug_derive::Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResult {
    pub user_agent: String,
    #[debug(with = "crate::fmt::redacted")]
    pub cookie: String,
}

/// Run the harvest script through any [`ScriptRunner`] and interpret the result.
pub async fn harvest_token(runner: &dyn ScriptRunner) -> Result<String, PortalError> {
    let raw = runner.run_script(HARVEST_SCRIPT).await?;
    let harvest: Harvest = serde_json::from_value(raw).map_err(|e| {
        PortalError::ChallengeUnavailable(format!("unexpected harvest result: {e}"))
    })?;
    interpret_harvest(harvest)
}

/// Turn a harvest into the cookie string. An empty cookie is returned as-is;
/// callers decide whether it is usable.
pub fn interpret_harvest(harvest: Harvest) -> Result<String, PortalError> {
    match harvest {
        Harvest::Token(token) => Ok(token),
        Harvest::Cookie(cookie) => {
            if cookie.is_empty() {
                warn!("challenge installed no solver and the cookie jar is empty");
            }
            Ok(cookie)
        }
        Harvest::Missing => Err(PortalError::ChallengeUnavailable(
            "landing page has no challenge script in <head>".to_owned(),
        )),
    }
}

/// Drives a browser through the portal's bot challenge.
#[derive(Clone)]
pub struct ChallengeSolver {
    urls: PortalUrls,
    launch: LaunchOptions,
    store: SessionStore,
}

impl ChallengeSolver {
    pub fn new(urls: PortalUrls, launch: LaunchOptions, store: SessionStore) -> Self {
        Self {
            urls,
            launch,
            store,
        }
    }

    /// Solve the challenge for `identity`, returning the token and the user-agent it is bound to.
    pub async fn solve(&self, identity: &IdentityKey) -> Result<ChallengeResult, PortalError> {
        let user_agent = self.store.user_agent_for(identity);
        let started = Instant::now();

        let session = BrowserSession::launch(&self.launch, &user_agent).await?;
        let result = async {
            session.goto(&self.urls.landing()).await?;
            session.wait_for_network_idle().await?;
            harvest_token(&session).await
        }
        .await;
        session.close().await;

        let cookie = result?;
        info!(
            identity = %identity,
            elapsed = fmt_duration(started.elapsed()),
            empty = cookie.is_empty(),
            "challenge solved"
        );
        debug!(identity = %identity, cookie_len = cookie.len(), "challenge cookie harvested");

        Ok(ChallengeResult { user_agent, cookie })
    }
}
