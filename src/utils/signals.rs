use crate::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Resolves on the first SIGTERM or SIGINT.
pub async fn handle_signals() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!(target: "signals", "Received {}, shutting down", received);

    Ok(())
}
