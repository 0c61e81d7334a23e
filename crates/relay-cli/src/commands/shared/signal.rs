use tokio_util::sync::CancellationToken;

/// A token cancelled on the first Ctrl-C.
///
/// In-flight runs stop at their next checkpoint and finish as `partial`.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = trigger.cancelled() => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    tracing::warn!(%error, "could not listen for Ctrl-C");
                    return;
                }
                tracing::warn!("interrupt received, cancelling in-flight runs");
                trigger.cancel();
            }
        }
    });
    cancel
}
