//! Trailing-edge debounce: rapid pushes collapse into one call after a quiet period.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Quiet period for search inputs.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Runs `action` with the most recent value once no new value arrived for `quiet`.
/// Earlier pending values are superseded, never queued. Dropping the debouncer stops it.
pub struct Debouncer<T> {
    tx: mpsc::UnboundedSender<Option<T>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Must be called inside a Tokio runtime.
    pub fn spawn<F, Fut>(quiet: Duration, mut action: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<T>>();
        let task = tokio::spawn(async move {
            let mut pending: Option<T> = None;
            loop {
                match pending.take() {
                    None => match rx.recv().await {
                        Some(next) => pending = next,
                        None => break,
                    },
                    Some(value) => {
                        tokio::select! {
                            next = rx.recv() => match next {
                                Some(next) => pending = next,
                                None => break,
                            },
                            _ = tokio::time::sleep(quiet) => action(value).await,
                        }
                    }
                }
            }
        });
        Debouncer { tx, task }
    }

    /// Restart the quiet period with `value` as the pending one.
    pub fn push(&self, value: T) {
        let _ = self.tx.send(Some(value));
    }

    /// Drop whatever is pending without firing.
    pub fn cancel(&self) {
        let _ = self.tx.send(None);
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
