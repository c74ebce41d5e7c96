use crate::services::Service;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use crate::utils::fmt_duration;
use futures::future::select_all;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns registered services, spawns them, and shuts them down together.
pub struct ServiceManager {
    registered: Vec<Box<dyn Service>>,
    running: Vec<(&'static str, JoinHandle<anyhow::Result<()>>)>,
    cancel: CancellationToken,
    statuses: ServiceStatusRegistry,
}

impl ServiceManager {
    pub fn new(statuses: ServiceStatusRegistry) -> Self {
        Self {
            registered: Vec::new(),
            running: Vec::new(),
            cancel: CancellationToken::new(),
            statuses,
        }
    }

    pub fn register_service(&mut self, service: Box<dyn Service>) {
        self.statuses.set(service.name(), ServiceStatus::Starting);
        self.registered.push(service);
    }

    pub fn has_services(&self) -> bool {
        !self.registered.is_empty() || !self.running.is_empty()
    }

    pub fn spawn_all(&mut self) {
        for service in self.registered.drain(..) {
            let name = service.name();
            let cancel = self.cancel.child_token();
            let statuses = self.statuses.clone();
            let handle = tokio::spawn(async move {
                statuses.set(name, ServiceStatus::Active);
                let result = service.run(cancel).await;
                let status = if result.is_ok() {
                    ServiceStatus::Disabled
                } else {
                    ServiceStatus::Error
                };
                statuses.set(name, status);
                result
            });
            debug!(service = name, "service spawned");
            self.running.push((name, handle));
        }
    }

    /// Wait until any running service exits on its own. Returns its name and
    /// whether it failed.
    pub async fn wait_any(&mut self) -> Option<(&'static str, bool)> {
        if self.running.is_empty() {
            return None;
        }
        let handles = self.running.iter_mut().map(|(_, handle)| handle);
        let (result, index, rest) = select_all(handles).await;
        drop(rest);
        let (name, _) = self.running.remove(index);

        let failed = match result {
            Ok(Ok(())) => {
                info!(service = name, "service exited");
                false
            }
            Ok(Err(e)) => {
                error!(service = name, error = ?e, "service failed");
                true
            }
            Err(e) => {
                error!(service = name, error = ?e, "service task panicked");
                true
            }
        };
        Some((name, failed))
    }

    /// Cancel every service and wait up to `timeout` for them to finish.
    /// Returns the names of services still running at the deadline.
    pub async fn shutdown(self, timeout: Duration) -> Vec<&'static str> {
        let started = Instant::now();
        self.cancel.cancel();

        let mut pending = Vec::new();
        for (name, mut handle) in self.running {
            let remaining = timeout.saturating_sub(started.elapsed());
            match tokio::time::timeout(remaining, &mut handle).await {
                Ok(Ok(Ok(()))) => debug!(service = name, "service stopped"),
                Ok(Ok(Err(e))) => warn!(service = name, error = ?e, "service stopped with error"),
                Ok(Err(e)) => warn!(service = name, error = ?e, "service task panicked during shutdown"),
                Err(_) => {
                    handle.abort();
                    pending.push(name);
                }
            }
        }

        info!(
            elapsed = fmt_duration(started.elapsed()),
            pending = pending.len(),
            "services shut down"
        );
        pending
    }
}
