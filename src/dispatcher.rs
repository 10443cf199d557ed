//! Worker-pool task dispatch and notification relay
//!
//! The dispatcher runs units of work off the interactive context on a bounded
//! pool sized to host parallelism, and relays progress/warning/finished
//! notifications from each task to a single consumer in emission order.
//! Failures inside a task (errors or panics) are captured and delivered as a
//! distinct [`Notification::TaskFailed`] rather than propagating; the pool
//! remains usable for subsequent submissions.

use crate::error::Result;
use crate::types::Notification;
use futures::FutureExt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for outstanding workers to drain before the
/// process proceeds regardless of stragglers.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Poll interval while waiting for workers to drain during shutdown.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Handle a running task uses to emit notifications back to the consumer.
///
/// Cloneable and cheap; notifications sent through one notifier arrive at the
/// consumer in emission order.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Emit a progress update.
    ///
    /// `current`/`total` drive a determinate progress surface; pass
    /// `indeterminate = true` to request a pulsing one instead.
    pub fn progress(
        &self,
        message: impl Into<String>,
        current: Option<u64>,
        total: Option<u64>,
        indeterminate: bool,
    ) {
        // send() fails only when the consumer is gone, which is fine - drop it
        self.tx
            .send(Notification::Progress {
                message: message.into(),
                current,
                total,
                indeterminate,
            })
            .ok();
    }

    /// Emit a recoverable warning.
    pub fn warning(&self, message: impl Into<String>) {
        self.tx
            .send(Notification::Warning {
                message: message.into(),
            })
            .ok();
    }

    /// Emit a terminal success message for the task.
    pub fn finished(&self, message: impl Into<String>) {
        self.tx
            .send(Notification::Finished {
                message: message.into(),
            })
            .ok();
    }

    fn task_failed(&self, task: &str, message: String) {
        self.tx
            .send(Notification::TaskFailed {
                task: task.to_string(),
                message,
            })
            .ok();
    }
}

/// Decrements the active-task counter when a worker finishes, panics included.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs units of work on a bounded worker pool and relays their notifications
/// to a single consumer.
///
/// Cloneable; all fields are shared. Tasks may themselves submit further tasks
/// through a clone (the fan-out coordinator and its retries do exactly that).
#[derive(Clone)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    stop: CancellationToken,
    tx: mpsc::UnboundedSender<Notification>,
    active: Arc<AtomicUsize>,
}

impl Dispatcher {
    /// Create a dispatcher and the single consumer's notification receiver.
    ///
    /// The pool is sized to host parallelism and is not user-configurable.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        tracing::info!(workers, "Worker pool initialized");

        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            permits: Arc::new(Semaphore::new(workers)),
            stop: CancellationToken::new(),
            tx,
            active: Arc::new(AtomicUsize::new(0)),
        };
        (dispatcher, rx)
    }

    /// A notifier handle bound to the consumer channel.
    pub fn notifier(&self) -> Notifier {
        Notifier {
            tx: self.tx.clone(),
        }
    }

    /// The process-wide stop token, observed cooperatively by looping tasks.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// True once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Number of tasks currently queued or running.
    pub fn active_tasks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Schedule `work` to run on a worker drawn from the pool.
    ///
    /// `work` receives a [`Notifier`] and may emit any number of
    /// notifications. An `Err` return or a panic inside `work` is captured and
    /// delivered as [`Notification::TaskFailed`]; neither crashes the pool.
    pub fn submit<F, Fut>(&self, label: impl Into<String>, work: F) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(Notifier) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        let permits = Arc::clone(&self.permits);
        let notifier = self.notifier();

        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        tokio::spawn(async move {
            let _guard = guard;

            // The semaphore is never closed, so acquire only fails if the
            // runtime is tearing down
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let outcome = std::panic::AssertUnwindSafe(work(notifier.clone()))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(task = %label, error = %e, "Task failed");
                    notifier.task_failed(&label, e.to_string());
                }
                Err(panic) => {
                    let message = panic_message(panic);
                    tracing::error!(task = %label, panic = %message, "Task panicked");
                    notifier.task_failed(&label, format!("panic: {}", message));
                }
            }
        })
    }

    /// Set the process-wide stop flag.
    ///
    /// Long-running or looping tasks observe it cooperatively between
    /// iterations; a task already inside a blocking external call is not
    /// forcibly cancelled.
    pub fn request_shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.stop.cancel();
    }

    /// Request shutdown, then wait a bounded grace period for outstanding
    /// workers to drain before returning.
    pub async fn shutdown(&self) {
        self.request_shutdown();

        let outstanding = self.active_tasks();
        if outstanding > 0 {
            tracing::info!(outstanding, "Waiting for outstanding workers to drain");
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, self.wait_for_idle()).await;
        match drained {
            Ok(()) => tracing::info!("All workers drained"),
            Err(_) => tracing::warn!(
                remaining = self.active_tasks(),
                "Grace period elapsed, proceeding with shutdown"
            ),
        }
    }

    async fn wait_for_idle(&self) {
        while self.active_tasks() > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

/// Extract a readable message from a panic payload.
fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn notifications_from_one_task_arrive_in_emission_order() {
        let (dispatcher, mut rx) = Dispatcher::new();

        dispatcher
            .submit("ordered", |notifier| async move {
                notifier.progress("step 1", Some(1), Some(3), false);
                notifier.progress("step 2", Some(2), Some(3), false);
                notifier.warning("hiccup");
                notifier.finished("done");
                Ok(())
            })
            .await
            .unwrap();

        let mut messages = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            messages.push(notification);
        }

        assert_eq!(messages.len(), 4);
        assert!(matches!(&messages[0], Notification::Progress { message, .. } if message == "step 1"));
        assert!(matches!(&messages[1], Notification::Progress { message, .. } if message == "step 2"));
        assert!(matches!(&messages[2], Notification::Warning { message } if message == "hiccup"));
        assert!(matches!(&messages[3], Notification::Finished { message } if message == "done"));
    }

    #[tokio::test]
    async fn task_error_is_delivered_as_task_failed() {
        let (dispatcher, mut rx) = Dispatcher::new();

        dispatcher
            .submit("failing", |_notifier| async move {
                Err(Error::Other("deliberate failure".to_string()))
            })
            .await
            .unwrap();

        let notification = rx.recv().await.unwrap();
        assert!(matches!(
            notification,
            Notification::TaskFailed { task, message } if task == "failing" && message.contains("deliberate failure")
        ));
    }

    #[tokio::test]
    async fn panicking_task_leaves_pool_usable() {
        let (dispatcher, mut rx) = Dispatcher::new();

        dispatcher
            .submit("panicking", |_notifier| async move {
                panic!("boom");
            })
            .await
            .unwrap();

        let notification = rx.recv().await.unwrap();
        assert!(matches!(
            notification,
            Notification::TaskFailed { message, .. } if message.contains("boom")
        ));

        // A subsequent submission still runs to completion
        dispatcher
            .submit("survivor", |notifier| async move {
                notifier.finished("still alive");
                Ok(())
            })
            .await
            .unwrap();

        let notification = rx.recv().await.unwrap();
        assert!(matches!(
            notification,
            Notification::Finished { message } if message == "still alive"
        ));
    }

    #[tokio::test]
    async fn shutdown_abandons_stragglers_within_grace_period() {
        let (dispatcher, _rx) = Dispatcher::new();
        let stop = dispatcher.stop_token();

        // A cooperative task that only exits once the stop flag is observed,
        // plus one that ignores the flag entirely
        dispatcher.submit("cooperative", {
            let stop = stop.clone();
            move |_notifier| async move {
                stop.cancelled().await;
                Ok(())
            }
        });
        dispatcher.submit("straggler", |_notifier| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let start = std::time::Instant::now();
        dispatcher.shutdown().await;

        assert!(dispatcher.is_shutting_down());
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "shutdown must not wait on stragglers past the grace period"
        );
    }

    #[tokio::test]
    async fn active_count_tracks_queued_and_running_tasks() {
        let (dispatcher, _rx) = Dispatcher::new();
        assert_eq!(dispatcher.active_tasks(), 0);

        let handle = dispatcher.submit("counted", |_notifier| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });
        assert!(dispatcher.active_tasks() >= 1);

        handle.await.unwrap();
        assert_eq!(dispatcher.active_tasks(), 0);
    }
}
