use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token when the process receives SIGINT or SIGTERM.
///
/// In-flight requests and backoff waits observe the token and return
/// promptly; the credential cache is left usable.
pub fn set_up_process_interrupt_handler() -> Result<CancellationToken> {
    let root = CancellationToken::new();
    let handler_token = root.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            // Second interrupt: stop waiting for cleanup.
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .context("Error setting interrupt handler")?;
    Ok(root)
}
