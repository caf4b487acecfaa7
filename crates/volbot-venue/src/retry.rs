use std::future::Future;

use tokio::time::sleep;
use tracing::{debug, warn};
use volbot_models::RetryPolicy;

use crate::error::{RetryError, VenueError};

/// Run a venue call, backing off exponentially while the venue rate-limits it.
///
/// Any other error is returned on the first occurrence. The sleep only suspends the
/// calling task.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VenueError>>,
{
    let max_attempts = policy.max_attempts();
    let mut delay = policy.initial_delay();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limit() => {
                if attempt >= max_attempts {
                    warn!(attempts = attempt, "venue still rate limiting, giving up");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                sleep(delay).await;
                delay = policy.next_delay(delay);
                attempt += 1;
            }
            Err(e) => return Err(RetryError::Venue(e)),
        }
    }
}
