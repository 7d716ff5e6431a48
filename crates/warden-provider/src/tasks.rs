//! Watch task scheduling.
//!
//! Every watcher runs as its own tokio task so a slow or failing source never
//! delays another. Stopping cancels all tasks and waits for them to exit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use warden_core::{Error, Result};
use warden_rules::RuleSetProcessor;

/// One schedulable unit of work.
#[async_trait]
pub(crate) trait Watcher: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Fetch once and report changes. Never fails; problems are logged.
    async fn tick(&mut self, processor: &dyn RuleSetProcessor);
}

/// Running watch tasks of one provider.
#[derive(Debug, Default)]
pub(crate) struct WatchTasks {
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WatchTasks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `watcher` now and then every `interval`. Without an interval the
    /// watcher runs once.
    pub(crate) fn spawn<W: Watcher>(
        &self,
        mut watcher: W,
        interval: Option<Duration>,
        processor: Arc<dyn RuleSetProcessor>,
    ) -> Result<()> {
        let cancel = self.cancel.child_token();
        let interval = interval.filter(|period| !period.is_zero());

        let handle = tokio::spawn(async move {
            let mut ticker = interval.map(|period| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            loop {
                if let Some(ticker) = ticker.as_mut() {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = watcher.tick(processor.as_ref()) => {}
                }

                if ticker.is_none() {
                    break;
                }
            }

            tracing::debug!(watcher = %watcher.name(), "Watcher stopped");
        });

        self.handles
            .lock()
            .map_err(|_| Error::internal("watch task registry poisoned"))?
            .push(handle);
        Ok(())
    }

    /// Cancel every task and wait until all have exited.
    pub(crate) async fn stop(&self) {
        self.cancel.cancel();

        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                tracing::warn!(error = %err, "Watcher task ended abnormally");
            }
        }
    }

    /// Number of tasks spawned and not yet collected by [`WatchTasks::stop`].
    pub(crate) fn len(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or_default()
    }
}
