//! # OS termination signals for the root loop.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

/// Completes on the first termination signal.
///
/// Returns `Err` if a listener cannot be installed; the caller then simply
/// never observes a signal.
#[cfg(unix)]
pub(crate) async fn termination() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = int.recv() => {},
        _ = term.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
