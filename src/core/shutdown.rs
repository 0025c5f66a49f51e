//! # OS signal handling for hosts running an engine.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal;
//! [`stop_on_signal`] waits for one and then stops the engine.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT` (Ctrl-C), `SIGTERM` (systemd/Kubernetes), `SIGQUIT`.
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`].

use tracing::info;

use crate::core::Engine;

/// Waits for a termination signal.
///
/// Each call registers its own listeners. Returns `Err` if registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => info!(signal = "SIGINT", "shutdown signal received"),
        _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown signal received"),
        _ = sigquit.recv() => info!(signal = "SIGQUIT", "shutdown signal received"),
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call registers its own listeners. Returns `Err` if registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl_c", "shutdown signal received");
    Ok(())
}

/// Waits for a termination signal, then drains and stops `engine`.
///
/// The engine is stopped even if signal registration fails; the error is
/// returned afterwards.
pub async fn stop_on_signal(engine: &Engine) -> std::io::Result<()> {
    let res = wait_for_shutdown_signal().await;
    engine.stop().await;
    res
}
