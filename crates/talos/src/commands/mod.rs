//! CLI command implementations

pub mod config;
pub mod dead_letters;
pub mod drain;
pub mod run;
pub mod scan;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Token cancelled on Ctrl-C
pub(crate) fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing the current step");
            trigger.cancel();
        }
    });
    cancel
}
