use std::future::Future;
use std::time::{Duration, Instant};

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

/// Bounds for a retry loop. The timeout covers every attempt and every sleep.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    pub timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Why a retry loop gave up.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError<E: std::fmt::Display> {
    #[error("{0}")]
    Aborted(E),

    #[error("timeout after {elapsed:?} ({attempts} attempts){}", last_suffix(.last))]
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        last: Option<E>,
    },
}

fn last_suffix<E: std::fmt::Display>(last: &Option<E>) -> String {
    match last {
        Some(e) => format!(", last error: {}", e),
        None => String::new(),
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max`, plus up to a quarter of that as jitter.
pub fn backoff_delay(options: &RetryOptions, attempt: u32, jitter_seed: u64) -> Duration {
    let base_ms = options.base_delay.as_millis().min(u64::MAX as u128) as u64;
    let max_ms = options.max_delay.as_millis().min(u64::MAX as u128) as u64;
    let exp = 1u64 << attempt.saturating_sub(1).min(20);
    let without_jitter = base_ms.saturating_mul(exp).min(max_ms);

    let jitter = jitter_seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add((attempt as u64).wrapping_mul(0x9E3779B97F4A7C15));
    let jitter_ms = jitter % (without_jitter / 4).max(1);

    Duration::from_millis(without_jitter.saturating_add(jitter_ms).min(max_ms.max(1)))
}

/// Retry a fallible async operation until it succeeds, `classify` says
/// `Abort`, or `options.timeout` elapses.
///
/// Each attempt is itself bounded by the remaining time, so a hung call
/// cannot stretch the loop past its deadline.
pub async fn retry_with_predicate<F, Fut, T, E, C>(
    options: RetryOptions,
    operation_name: &str,
    classify: C,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> RetryDecision,
{
    let started = Instant::now();
    let jitter_seed = uuid::Uuid::new_v4().as_u128() as u64;
    let mut attempt: u32 = 0;
    let mut last: Option<E> = None;

    loop {
        let remaining = options.timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(timed_out(operation_name, attempt, started, last));
        }

        attempt += 1;
        let err = match tokio::time::timeout(remaining, f()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(e)) => e,
            Err(_) => return Err(timed_out(operation_name, attempt, started, last)),
        };

        if classify(&err) == RetryDecision::Abort {
            tracing::debug!(
                operation = operation_name,
                attempt = attempt,
                error = %err,
                "Non-retryable error"
            );
            return Err(RetryError::Aborted(err));
        }

        let delay = backoff_delay(&options, attempt, jitter_seed);
        let remaining = options.timeout.saturating_sub(started.elapsed());
        tracing::warn!(
            operation = operation_name,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after transient failure"
        );
        last = Some(err);

        if delay >= remaining {
            tokio::time::sleep(remaining).await;
            return Err(timed_out(operation_name, attempt, started, last));
        }
        tokio::time::sleep(delay).await;
    }
}

fn timed_out<E: std::fmt::Display>(
    operation_name: &str,
    attempts: u32,
    started: Instant,
    last: Option<E>,
) -> RetryError<E> {
    tracing::error!(
        operation = operation_name,
        attempts = attempts,
        "Retry deadline exceeded"
    );
    RetryError::TimedOut {
        attempts,
        elapsed: started.elapsed(),
        last,
    }
}
