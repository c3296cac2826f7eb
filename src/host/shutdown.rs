use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancelation` on ctrl-c. Returns as soon as the token is cancelled for any reason.
///
/// Browsers stop the host by closing its stdin, so this is mostly useful when serving from a
/// terminal.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
