//! Background polling of a [`RunningAppOracle`]
//!
//! The poll runs as an explicit tokio task owned through a [`PollHandle`].
//! Consumers read the latest signal from a `watch` channel; they are only
//! woken when the signal actually changes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{RunningAppOracle, RunningAppSignal};

/// Owner of a running poll task
pub struct PollHandle {
    signal: watch::Receiver<RunningAppSignal>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Shortest cadence the poller accepts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Start polling `oracle` every `interval`.
///
/// The first read happens before this returns, so the signal is populated
/// before any caller can consult it. Must be called inside a tokio runtime.
/// A zero interval is raised to [`MIN_INTERVAL`].
pub fn spawn_poller(oracle: Arc<dyn RunningAppOracle>, interval: Duration) -> PollHandle {
    if interval < MIN_INTERVAL {
        warn!(?interval, "Poll interval too short, using the minimum");
    }
    let interval = interval.max(MIN_INTERVAL);

    let initial = oracle.running_app();
    if let Some(app) = &initial {
        info!(pid = app.pid, name = %app.display_name, "Managed process running at startup");
    }

    let (signal_tx, signal_rx) = watch::channel(initial);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // Skip first immediate tick, already polled above

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {}
            }

            // procfs reads block; keep them off the runtime thread
            let reader = Arc::clone(&oracle);
            let latest = match tokio::task::spawn_blocking(move || reader.running_app()).await {
                Ok(latest) => latest,
                Err(e) => {
                    warn!(error = %e, "Running-app read failed, keeping last signal");
                    continue;
                }
            };
            signal_tx.send_if_modified(|current| {
                if *current == latest {
                    return false;
                }
                match &latest {
                    Some(app) => info!(pid = app.pid, name = %app.display_name, "Managed process started"),
                    None => info!("Managed process exited"),
                }
                *current = latest;
                true
            });
        }

        debug!("Running-app poller stopped");
        // signal_tx drops here; subscribers observe the channel as closed
    });

    PollHandle {
        signal: signal_rx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

impl PollHandle {
    /// Latest known signal
    pub fn latest(&self) -> RunningAppSignal {
        self.signal.borrow().clone()
    }

    /// Receiver that is woken on every change
    pub fn subscribe(&self) -> watch::Receiver<RunningAppSignal> {
        self.signal.clone()
    }

    /// Stop polling and wait for the task to finish.
    ///
    /// Once this returns no further change notifications are sent.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Running-app poller ended abnormally");
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
