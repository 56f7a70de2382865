//! Exponential-backoff retry for store write conflicts (spec §4.C, §7).
//!
//! Grounded on the teacher's saga-step retry loop (`src/saga.rs`):
//! `100ms * 2^(attempt-1)` backoff between attempts, generalized here
//! with a cap and applied only to [`Error::Conflict`].

use crate::domain::error::{Error, Result};
use rand::Rng;
use std::time::Duration;
use tracing::warn;

/// Maximum number of attempts (the first try plus up to 4 retries).
pub const MAX_ATTEMPTS: u32 = 5;
/// Base backoff delay.
pub const BASE_DELAY: Duration = Duration::from_millis(100);
/// Backoff delay ceiling.
pub const MAX_DELAY: Duration = Duration::from_secs(5);

/// Run `op` up to [`MAX_ATTEMPTS`] times, retrying only on
/// [`Error::Conflict`] with exponential backoff plus jitter. Any other
/// error, or exhausting attempts, returns immediately.
pub async fn with_conflict_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(Error::Conflict(msg)) if attempt < MAX_ATTEMPTS => {
                let delay = backoff_delay(attempt);
                warn!(attempt, %msg, delay_ms = delay.as_millis() as u64, "retrying after write conflict");
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE_DELAY.saturating_mul(1u32 << (attempt - 1).min(16));
    let capped = exp.min(MAX_DELAY);
    let jitter_ms = rand::rng().random_range(0..=capped.as_millis() as u64 / 10 + 1);
    capped + Duration::from_millis(jitter_ms)
}
