//! Background renewal of cached sessions.

use crate::portal::PortalError;
use crate::session::store::{Credentials, IdentityKey, SessionStore};
use crate::utils::fmt_duration;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Re-establishes a session for one identity from its remembered credentials.
#[async_trait]
pub trait SessionRenewer: Send + Sync {
    async fn renew(&self, identity: &IdentityKey, credentials: &Credentials) -> Result<(), PortalError>;
}

/// Outcome counts for one renewal cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenewalReport {
    pub renewed: usize,
    pub failed: usize,
    /// Identities seen but never logged in, so there was nothing to replay.
    pub skipped: usize,
}

/// Keeps every cached identity's session fresh.
pub struct RenewalLoop {
    store: SessionStore,
    renewer: Arc<dyn SessionRenewer>,
    interval: Duration,
}

impl RenewalLoop {
    pub fn new(store: SessionStore, renewer: Arc<dyn SessionRenewer>, interval: Duration) -> Self {
        Self {
            store,
            renewer,
            interval,
        }
    }

    /// Renew every identity once, sequentially. A failure is logged and the
    /// cycle moves on to the next identity.
    pub async fn renew_all(&self) -> RenewalReport {
        let mut report = RenewalReport::default();
        let started = Instant::now();

        for identity in self.store.keys() {
            let Some(credentials) = self.store.peek(&identity).and_then(|e| e.credentials) else {
                debug!(identity = %identity, "no credentials recorded, skipping renewal");
                report.skipped += 1;
                continue;
            };

            match self.renewer.renew(&identity, &credentials).await {
                Ok(()) => {
                    info!(identity = %identity, "session renewed");
                    report.renewed += 1;
                }
                Err(e) => {
                    error!(identity = %identity, error = ?e, "failed to renew session");
                    report.failed += 1;
                }
            }
        }

        debug!(
            renewed = report.renewed,
            failed = report.failed,
            skipped = report.skipped,
            elapsed = fmt_duration(started.elapsed()),
            "renewal cycle finished"
        );
        report
    }

    /// Sleep for the interval, renew everything, repeat until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval = fmt_duration(self.interval), "session renewal started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.renew_all() => {}
            }
        }
        info!("session renewal stopped");
    }
}
