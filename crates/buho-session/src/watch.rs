//! Background polling that ends sessions nobody is touching.
//!
//! Expiry is also checked lazily whenever the credential is requested, so
//! the watch only matters for a client sitting idle on a page: it notices
//! the deadline and redirects without waiting for the next request.
//!
//! ```ignore
//! let manager = Arc::new(manager);
//! let watch = SessionWatch::spawn(Arc::clone(&manager));
//! // ...
//! watch.stop().await;
//! ```

use std::sync::Arc;

use buho_transport::ApiTransport;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::{SessionManager, SessionStatus, SessionStore};

/// Handle to a running watch task. Dropping it stops the task.
pub struct SessionWatch {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SessionWatch {
    /// Starts polling `manager` every `poll_interval` from its config.
    ///
    /// The first check happens one interval after spawning, not
    /// immediately. Missed ticks are skipped rather than bunched up.
    pub fn spawn<S, T>(manager: Arc<SessionManager<S, T>>) -> Self
    where
        S: SessionStore,
        T: ApiTransport,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let period = manager.config().poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(poll_ms = period.as_millis() as u64, "session watch started");

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        match manager.check_expiry().await {
                            SessionStatus::Active | SessionStatus::NoSession => {}
                            ended => tracing::debug!(?ended, "session watch ended the session"),
                        }
                    }
                }
            }

            tracing::debug!("session watch stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Stops polling and waits for the task to finish.
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// `true` while the task is running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
