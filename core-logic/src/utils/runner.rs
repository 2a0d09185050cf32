use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Returns a token that is cancelled on the first Ctrl+C.
///
/// The run stops at the next batch boundary or poll attempt; a second
/// Ctrl+C terminates the process.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cloned_token = token.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("🛑 Received Ctrl+C. Finishing the current step, press again to abort...");
                cloned_token.cancel();
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
                return;
            }
        }

        if signal::ctrl_c().await.is_ok() {
            error!("🛑 Second Ctrl+C, aborting");
            std::process::exit(130);
        }
    });

    token
}
