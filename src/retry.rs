//! Classification-aware retry with backoff
//!
//! [`run_with_backoff`] wraps any remote operation with the crate's single
//! retry policy: rate-limited failures back off exponentially
//! (`base * 2^attempt`, capped), transient network failures back off
//! linearly (`base * (attempt + 1)`), and fatal failures return
//! immediately. A server-provided `Retry-After` hint can stretch a computed
//! delay but never shrink it.
//!
//! The executor holds no state of its own beyond the policy, so each
//! traversal gets independent backoff behavior by construction.

use crate::config::RetryPolicy;
use crate::error::{Classification, Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Compute the backoff delay for one failed attempt
///
/// `attempt` is 0-indexed: the delay after the first failure uses
/// `attempt = 0`. Fatal errors never reach this function.
pub fn backoff_delay(
    policy: &RetryPolicy,
    classification: Classification,
    attempt: u32,
) -> Duration {
    let raw = match classification {
        Classification::RateLimited => {
            // Saturate rather than overflow for absurd attempt counts
            let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
            policy.rate_limit_base.saturating_mul(factor)
        }
        Classification::Transient => policy.transient_base.saturating_mul(attempt + 1),
        Classification::Fatal => Duration::ZERO,
    };
    raw.min(policy.max_delay)
}

/// Execute an async operation with classification-aware retry
///
/// The operation is attempted up to `policy.max_attempts` times (including
/// the first). On success the result is returned immediately; on a fatal
/// error, the error. After the final attempt the last error is returned
/// unchanged. The cancellation token is checked before every attempt and
/// interrupts any backoff sleep.
pub async fn run_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                let classification = e.classification();
                if classification == Classification::Fatal || attempt + 1 >= max_attempts {
                    if classification != Classification::Fatal {
                        tracing::error!(
                            error = %e,
                            attempts = attempt + 1,
                            "operation failed after all retry attempts exhausted"
                        );
                    }
                    return Err(e);
                }

                let mut delay = backoff_delay(policy, classification, attempt);
                if let Some(hint) = e.retry_after() {
                    delay = delay.max(hint.min(policy.max_delay));
                }
                if policy.jitter {
                    delay = add_jitter(delay, policy.max_delay);
                }

                tracing::warn!(
                    error = %e,
                    classification = ?classification,
                    attempt = attempt + 1,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }
}

/// Add random jitter to a delay, keeping it under the policy cap
///
/// Uniformly distributed between 0% and 100% of the delay, so the result
/// is between `delay` and `2 * delay`, clamped to `cap`.
fn add_jitter(delay: Duration, cap: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).min(cap)
}
