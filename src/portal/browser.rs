//! Headless Chromium sessions.
//!
//! Every browser-driven operation owns a [`BrowserSession`] for its whole
//! duration and must call [`BrowserSession::close`] on every exit path. The
//! `Drop` impl is only a backstop for panics and cancelled futures: it aborts
//! the CDP handler task, which drops the connection and lets chromiumoxide
//! reap the child process.

use crate::portal::agent::derive_fingerprint;
use crate::portal::errors::PortalError;
use crate::utils::fmt_duration;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// How often element lookups are retried while waiting for a selector.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound for one network-idle wait.
const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls `performance` resource entries until the count stays flat for a
/// second with the document complete, or the timeout passes.
const NETWORK_IDLE_SCRIPT: &str = r#"(async () => {
    const timeoutMs = __TIMEOUT_MS__;
    const idleMs = 1000;
    const interval = 250;
    const count = () => {
        try { return performance.getEntriesByType("resource").length; } catch (_) { return 0; }
    };

    const start = Date.now();
    let lastCount = count();
    let stableMs = 0;
    while (Date.now() - start < timeoutMs) {
        await new Promise(r => setTimeout(r, interval));
        const current = count();
        if (document.readyState === "complete" && current === lastCount) {
            stableMs += interval;
            if (stableMs >= idleMs) {
                return { ok: true, readyState: document.readyState, resourceCount: current, waitedMs: Date.now() - start };
            }
        } else {
            stableMs = 0;
        }
        lastCount = current;
    }
    return { ok: false, readyState: document.readyState, resourceCount: lastCount, waitedMs: Date.now() - start };
})()"#;

/// What the network-idle poll observed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdle {
    pub ok: bool,
    pub ready_state: String,
    pub resource_count: u64,
    pub waited_ms: u64,
}

/// Wait in-page for network activity to settle. Not settling within `timeout`
/// is logged, not an error; the page is usually usable anyway.
pub async fn settle_network(
    runner: &dyn ScriptRunner,
    timeout: Duration,
) -> Result<NetworkIdle, PortalError> {
    let script = NETWORK_IDLE_SCRIPT.replace("__TIMEOUT_MS__", &timeout.as_millis().to_string());
    let raw = runner.run_script(&script).await?;
    let idle: NetworkIdle = serde_json::from_value(raw).map_err(|e| {
        PortalError::upstream(anyhow::Error::new(e).context("unexpected network-idle result"))
    })?;

    if idle.ok {
        debug!(resources = idle.resource_count, waited_ms = idle.waited_ms, "network idle");
    } else {
        warn!(
            ready_state = %idle.ready_state,
            resources = idle.resource_count,
            waited_ms = idle.waited_ms,
            "network did not settle, continuing"
        );
    }
    Ok(idle)
}

/// Launch parameters shared by every session.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
}

/// Executes JavaScript inside a live document and returns its JSON result.
///
/// This is the single seam through which page scripts run, so the challenge
/// harvest can be exercised without a browser.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run_script(&self, script: &str) -> Result<serde_json::Value, PortalError>;
}

/// A launched browser together with the one page it drives.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    /// Launch headless Chromium with `user_agent` pinned at the process level
    /// and open a blank page carrying the matching navigator overrides.
    pub async fn launch(options: &LaunchOptions, user_agent: &str) -> Result<Self, PortalError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 800)
            .request_timeout(options.navigation_timeout)
            .args([
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-accelerated-2d-canvas",
                "--no-first-run",
                "--no-zygote",
                "--disable-gpu",
                "--disable-web-security",
                "--disable-features=IsolateOrigins,site-per-process",
                "--disable-site-isolation-trials",
            ])
            .arg(format!("--user-agent={user_agent}"));
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|e| PortalError::upstream(anyhow::anyhow!("invalid browser config: {e}")))?;

        let started = Instant::now();
        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            PortalError::upstream(anyhow::Error::new(e).context("failed to launch browser"))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!(error = %e, "browser handler event error");
                }
            }
        });

        let page = match Self::open_page(&browser, user_agent).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        debug!(elapsed = fmt_duration(started.elapsed()), "browser launched");
        Ok(Self {
            browser,
            page,
            handler_task,
            navigation_timeout: options.navigation_timeout,
        })
    }

    async fn open_page(browser: &Browser, user_agent: &str) -> Result<Page, PortalError> {
        let page = browser.new_page("about:blank").await?;
        let fingerprint = derive_fingerprint(user_agent);
        let overrides = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .accept_language("en-US,en;q=0.9")
            .platform(fingerprint.platform)
            .build()
            .map_err(|e| PortalError::upstream(anyhow::anyhow!("invalid user-agent override: {e}")))?;
        page.set_user_agent(overrides).await?;
        Ok(page)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate and wait for the load to settle, bounded by the navigation timeout.
    pub async fn goto(&self, url: &str) -> Result<(), PortalError> {
        debug!(url, "navigating");
        self.bounded("navigation", async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok(())
        })
        .await
    }

    /// Wait for in-flight requests to die down after a navigation.
    pub async fn wait_for_network_idle(&self) -> Result<(), PortalError> {
        let timeout = NETWORK_IDLE_TIMEOUT.min(self.navigation_timeout / 2);
        self.bounded("network idle", async {
            settle_network(self, timeout).await.map(|_| ())
        })
        .await
    }

    /// Wait for a navigation triggered by something other than `goto` (e.g. a form submit).
    pub async fn wait_for_navigation(&self) -> Result<(), PortalError> {
        self.bounded("post-submit navigation", async {
            self.page.wait_for_navigation().await?;
            Ok(())
        })
        .await
    }

    /// Poll for `selector` until it appears or `timeout` passes.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, PortalError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if Instant::now() >= deadline => {
                    return Err(PortalError::upstream(
                        anyhow::Error::new(e)
                            .context(format!("timed out waiting for element `{selector}`")),
                    ));
                }
                Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    pub async fn current_url(&self) -> Result<String, PortalError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    pub async fn content(&self) -> Result<String, PortalError> {
        Ok(self.page.content().await?)
    }

    async fn bounded<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T, PortalError>>,
    ) -> Result<T, PortalError> {
        match tokio::time::timeout(self.navigation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(PortalError::upstream(anyhow::anyhow!(
                "{what} timed out after {}",
                fmt_duration(self.navigation_timeout)
            ))),
        }
    }

    /// Close the page, then the browser process. Failures are logged, never returned.
    pub async fn close(mut self) {
        if let Err(e) = self.page.clone().close().await {
            debug!(error = %e, "failed to close page");
        }
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "failed to close browser");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "failed to reap browser process");
        }
        self.handler_task.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl ScriptRunner for BrowserSession {
    async fn run_script(&self, script: &str) -> Result<serde_json::Value, PortalError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|e| PortalError::upstream(anyhow::anyhow!("invalid evaluate params: {e}")))?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the script it was asked to run and answers with a fixed value.
    struct RecordingRunner {
        answer: serde_json::Value,
        seen: Mutex<Option<String>>,
    }

    impl RecordingRunner {
        fn new(answer: serde_json::Value) -> Self {
            Self {
                answer,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ScriptRunner for RecordingRunner {
        async fn run_script(&self, script: &str) -> Result<serde_json::Value, PortalError> {
            *self.seen.lock().unwrap() = Some(script.to_owned());
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn test_settle_network_idle() {
        let runner = RecordingRunner::new(json!({
            "ok": true, "readyState": "complete", "resourceCount": 14, "waitedMs": 1250
        }));
        let idle = settle_network(&runner, Duration::from_millis(7500)).await.unwrap();
        assert!(idle.ok);
        assert_eq!(idle.resource_count, 14);

        let script = runner.seen.lock().unwrap().clone().unwrap();
        assert!(script.contains("const timeoutMs = 7500;"));
        assert!(!script.contains("__TIMEOUT_MS__"));
    }

    #[tokio::test]
    async fn test_settle_network_timeout_is_not_an_error() {
        let runner = RecordingRunner::new(json!({
            "ok": false, "readyState": "interactive", "resourceCount": 40, "waitedMs": 10000
        }));
        let idle = settle_network(&runner, NETWORK_IDLE_TIMEOUT).await.unwrap();
        assert!(!idle.ok);
        assert_eq!(idle.ready_state, "interactive");
    }

    #[tokio::test]
    async fn test_settle_network_garbage_result() {
        let runner = RecordingRunner::new(serde_json::Value::Null);
        assert!(matches!(
            settle_network(&runner, NETWORK_IDLE_TIMEOUT).await,
            Err(PortalError::UpstreamUnreachable(_))
        ));
    }
}
