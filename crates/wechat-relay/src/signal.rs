use tracing::{info, warn};

/// Resolves once the process is asked to stop (Ctrl+C, or SIGTERM on Unix),
/// letting in-flight callbacks finish their reply.
pub async fn shutdown_signal() {
    tokio::select! {
        name = interrupt() => info!(signal = name, "Shutting down"),
        name = terminate() => info!(signal = name, "Shutting down"),
    }
}

async fn interrupt() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(error) => {
            warn!(error = %error, "Ctrl+C handler unavailable");
            std::future::pending().await
        }
    }
}

#[cfg(unix)]
async fn terminate() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
            "SIGTERM"
        }
        Err(error) => {
            warn!(error = %error, "SIGTERM handler unavailable");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() -> &'static str {
    std::future::pending().await
}
