//! Bounded retry for transient network failure
//!
//! The attempt bound and delay are immutable inputs; the attempt counter
//! never escapes [`with_retries`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Every attempt failed; carries the final error.
#[derive(Debug, Error)]
#[error("Gave up after {attempts} attempts: {last_error}")]
pub struct RetryExhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub last_error: E,
}

/// Run `op` up to `attempts` times, sleeping `delay` between failures.
pub async fn with_retries<T, E, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!("attempt {attempt}/{attempts} failed: {err}");
                last_error = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(RetryExhausted {
        attempts,
        last_error: last_error.expect("at least one attempt ran"),
    })
}
