//! Background queue worker

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use recollect_core::{
    exp_backoff_work_loop, fixed_interval_work_loop, poll_and_handle_serially, Backoff, ConfigError,
    InteractionProcessor, InteractionQueue, WorkerConfig,
};
use recollect_flags::{Features, FileFlagSource};

/// Spawn the worker that drains `queue` through `processor`.
///
/// The worker idles while the maintenance killswitch is on and exits once
/// `stop` turns true.
pub fn spawn_worker(
    queue: InteractionQueue,
    processor: Arc<InteractionProcessor>,
    features: Features,
    config: &WorkerConfig,
    stop: watch::Receiver<bool>,
) -> JoinHandle<Result<(), ConfigError>> {
    let backoff = Backoff::from(config);
    let poll_timeout = config.poll_timeout();
    let batch_size = config.batch_size;
    let maintenance = features.maintenance();

    tokio::spawn(async move {
        let work = || {
            let queue = queue.clone();
            let processor = processor.clone();
            async move {
                poll_and_handle_serially(
                    "interaction",
                    queue.as_ref(),
                    processor.as_ref(),
                    poll_timeout,
                    batch_size,
                )
                .await
            }
        };

        exp_backoff_work_loop("interaction", work, || maintenance.is_enabled(), stop, backoff).await
    })
}

/// Spawn a task that re-reads the flag file every `interval` until `stop`
/// turns true. A failed read keeps the previous values.
pub fn spawn_flag_reloader(
    source: Arc<FileFlagSource>,
    interval: Duration,
    stop: watch::Receiver<bool>,
) -> JoinHandle<Result<(), ConfigError>> {
    tokio::spawn(async move {
        let work = || {
            let source = source.clone();
            async move { source.reload().map(|_| true) }
        };

        fixed_interval_work_loop("flag reload", work, || false, stop, interval).await
    })
}
