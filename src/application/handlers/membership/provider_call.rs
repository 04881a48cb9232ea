//! Retry policy for payment provider calls.

use std::future::Future;

use crate::ports::PaymentError;

/// Runs `call`, retrying exactly once if the first failure is transient.
///
/// Declines, invalid requests and configuration errors are returned as-is.
/// Callers pass an idempotency key inside the request so the retry cannot
/// create a second provider object.
pub(crate) async fn with_single_retry<T, F, Fut>(
    operation: &'static str,
    mut call: F,
) -> Result<T, PaymentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    let result = match call().await {
        Err(err) if err.retryable => {
            tracing::warn!(operation, error = %err, "Payment provider call failed, retrying once");
            call().await
        }
        other => other,
    };

    if let Err(err) = &result {
        if err.code.needs_operator() {
            tracing::error!(
                operation,
                error = %err,
                "Payment provider rejected credentials; check STRIPE configuration"
            );
        }
    }
    result
}
