//! Background work loops
//!
//! A worker calls some unit of work repeatedly, backing off exponentially
//! while there is nothing to do or the work keeps failing.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::{ConfigError, WorkerConfig};

/// Delay bounds for [`exp_backoff_work_loop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub min_delay: Duration,
    pub max_delay_nop: Duration,
    pub max_delay_err: Duration,
    /// Pause `min_delay` even after productive iterations
    pub enforce_min_delay: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay_nop: Duration::from_secs(10),
            max_delay_err: Duration::from_secs(30),
            enforce_min_delay: false,
        }
    }
}

impl Backoff {
    /// The same delay after every iteration, productive or not
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min_delay: delay,
            max_delay_nop: delay,
            max_delay_err: delay,
            enforce_min_delay: true,
        }
    }
}

impl From<&WorkerConfig> for Backoff {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            min_delay: Duration::from_secs(config.min_delay_secs),
            max_delay_nop: Duration::from_secs(config.max_delay_nop_secs),
            max_delay_err: Duration::from_secs(config.max_delay_err_secs),
            enforce_min_delay: false,
        }
    }
}

/// Sleep for `delay` unless shutdown is signalled first; true when stopping
async fn sleep_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    let sender_gone = tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = stop.changed() => changed.is_err(),
    };
    sender_gone || *stop.borrow()
}

/// Run `work` until `stop` turns true or its sender is dropped.
///
/// `work` returns whether it did anything. After productive iterations the
/// delay resets and the loop continues at once (or after `min_delay` with
/// `enforce_min_delay`). Idle iterations and skipped iterations double the
/// delay up to `max_delay_nop`; failures double it up to `max_delay_err`.
pub async fn exp_backoff_work_loop<W, Fut, E, S>(
    description: &str,
    mut work: W,
    skip: S,
    mut stop: watch::Receiver<bool>,
    backoff: Backoff,
) -> Result<(), ConfigError>
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
    S: Fn() -> bool,
{
    if backoff.min_delay < Duration::from_secs(1) {
        return Err(ConfigError::OutOfRange(
            "min_delay must be at least 1s for exponential backoff".to_string(),
        ));
    }

    let mut delay = backoff.min_delay;
    tracing::info!(description, "Starting work loop");

    while !*stop.borrow() {
        let max_delay = if skip() {
            tracing::debug!("Skipping {} work loop, retrying in {:?}...", description, delay);
            backoff.max_delay_nop
        } else {
            match work().await {
                Ok(true) => {
                    delay = backoff.min_delay;
                    if backoff.enforce_min_delay && sleep_or_stop(backoff.min_delay, &mut stop).await {
                        break;
                    }
                    continue;
                }
                Ok(false) => {
                    tracing::debug!("No {} work to do, retrying in {:?}...", description, delay);
                    backoff.max_delay_nop
                }
                Err(e) => {
                    tracing::error!("Error in {} work loop, retrying in {:?} ({})", description, delay, e);
                    backoff.max_delay_err
                }
            }
        };

        if sleep_or_stop(delay, &mut stop).await {
            break;
        }
        delay = (delay * 2).min(max_delay);
    }

    tracing::info!(description, "Work loop stopped");
    Ok(())
}

/// Run `work` every `interval` until stopped
pub async fn fixed_interval_work_loop<W, Fut, E, S>(
    description: &str,
    work: W,
    skip: S,
    stop: watch::Receiver<bool>,
    interval: Duration,
) -> Result<(), ConfigError>
where
    W: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
    S: Fn() -> bool,
{
    exp_backoff_work_loop(description, work, skip, stop, Backoff::fixed(interval)).await
}
