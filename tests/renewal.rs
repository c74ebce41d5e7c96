//! Session renewal against a scripted renewer.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use timetable::portal::PortalError;
use timetable::session::{Credentials, IdentityKey, RenewalLoop, SessionRenewer, SessionStore};
use tokio_util::sync::CancellationToken;

/// Counts calls and rejects one username.
#[derive(Default)]
struct ScriptedRenewer {
    calls: AtomicUsize,
    reject: &'static str,
}

#[async_trait]
impl SessionRenewer for ScriptedRenewer {
    async fn renew(&self, _identity: &IdentityKey, credentials: &Credentials) -> Result<(), PortalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if credentials.username == self.reject {
            return Err(PortalError::InvalidCredentials {
                code: "Invalid".to_owned(),
                message: "Invalid Username or Password!".to_owned(),
                cookies: String::new(),
            });
        }
        Ok(())
    }
}

fn seeded_store() -> SessionStore {
    let store = SessionStore::new(8);
    store.record_credentials(&IdentityKey::new("10.0.0.1"), Credentials::new("alice", "pw"));
    store.record_credentials(&IdentityKey::new("10.0.0.2"), Credentials::new("mallory", "bad"));
    store.record_credentials(&IdentityKey::new("10.0.0.3"), Credentials::new("bob", "pw"));
    // Seen but never logged in
    store.user_agent_for(&IdentityKey::new("10.0.0.4"));
    store
}

#[tokio::test]
async fn renew_all_continues_past_failures() {
    let store = seeded_store();
    let renewer = Arc::new(ScriptedRenewer {
        reject: "mallory",
        ..Default::default()
    });
    let renewal = RenewalLoop::new(store, renewer.clone(), Duration::from_secs(60));

    let report = renewal.renew_all().await;
    assert_eq!(report.renewed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(renewer.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn renew_all_on_empty_store_does_nothing() {
    let renewer = Arc::new(ScriptedRenewer::default());
    let renewal = RenewalLoop::new(SessionStore::new(4), renewer.clone(), Duration::from_secs(60));

    let report = renewal.renew_all().await;
    assert_eq!(report.renewed + report.failed + report.skipped, 0);
    assert_eq!(renewer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn run_repeats_until_cancelled() {
    let store = seeded_store();
    let renewer = Arc::new(ScriptedRenewer {
        reject: "mallory",
        ..Default::default()
    });
    let renewal = RenewalLoop::new(store, renewer.clone(), Duration::from_secs(300));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { renewal.run(cancel).await }
    });

    // Nothing happens before the first interval elapses
    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(renewer.calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(302)).await;
    assert_eq!(renewer.calls.load(Ordering::SeqCst), 6);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("renewal loop stops on cancel")
        .unwrap();
}
