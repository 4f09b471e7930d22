//! Cooperative cancellation for facade calls.

use super::types::EmbedError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Run `work` unless `cancel` fires first.
///
/// A token that is already cancelled short-circuits before `work` is polled, so no backend
/// request is issued. `None` means the call cannot be cancelled.
pub async fn run_cancellable<F, T>(
    cancel: Option<&CancellationToken>,
    work: F,
) -> Result<T, EmbedError>
where
    F: Future<Output = Result<T, EmbedError>>,
{
    let Some(token) = cancel else {
        return work.await;
    };
    if token.is_cancelled() {
        return Err(EmbedError::Cancelled);
    }

    tokio::select! {
        biased;
        () = token.cancelled() => {
            tracing::debug!("Operation cancelled while in flight");
            Err(EmbedError::Cancelled)
        }
        result = work => result,
    }
}
