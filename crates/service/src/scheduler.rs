use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Runs a blocking job every `interval`, one run at a time, until shutdown.
///
/// Shutdown raises the shared stop flag. A run already in flight sees the
/// flag at its next group boundary and is awaited before `run` returns.
pub struct Scheduler {
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Returns the number of runs that were started.
    pub async fn run<F, T, S>(&self, job: F, shutdown: S) -> usize
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
        T: Send + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let job = Arc::new(job);
        let wake = Arc::new(Notify::new());
        let watcher = {
            let stop = Arc::clone(&self.stop);
            let wake = Arc::clone(&wake);
            tokio::spawn(async move {
                shutdown.await;
                info!("shutdown requested");
                stop.store(true, Ordering::SeqCst);
                wake.notify_one();
            })
        };

        let mut runs = 0;
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = wake.notified() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            runs += 1;
            debug!(run = runs, "starting batch");
            let job = Arc::clone(&job);
            match tokio::task::spawn_blocking(move || job()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    error!(error = %format!("{err:#}"), "batch failed; retrying next tick")
                }
                Err(err) => error!(error = %err, "batch panicked; retrying next tick"),
            }
        }
        watcher.abort();
        info!(runs, "scheduler stopped");
        runs
    }
}
