use crate::services::manager::ServiceManager;
use crate::utils::fmt_duration;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl-C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Run until a shutdown signal arrives or a service exits, then stop everything.
pub async fn handle_shutdown_signals(mut manager: ServiceManager, timeout: Duration) -> ExitCode {
    let exit = tokio::select! {
        _ = shutdown_signal() => ExitCode::SUCCESS,
        exited = manager.wait_any() => match exited {
            Some((name, true)) => {
                error!(service = name, "service failed, shutting down");
                ExitCode::FAILURE
            }
            Some((name, false)) => {
                warn!(service = name, "service exited unexpectedly, shutting down");
                ExitCode::FAILURE
            }
            None => {
                warn!("no services running");
                ExitCode::FAILURE
            }
        },
    };

    info!(timeout = fmt_duration(timeout), "shutting down services");
    let pending = manager.shutdown(timeout).await;
    if pending.is_empty() {
        exit
    } else {
        warn!(services = ?pending, "services did not stop in time and were aborted");
        ExitCode::FAILURE
    }
}
