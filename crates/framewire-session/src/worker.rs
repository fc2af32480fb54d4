use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// A named loop thread whose join can be bounded by a timeout.
pub(crate) struct Worker {
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

impl Worker {
    pub(crate) fn spawn<F>(name: String, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                body();
                let _ = done_tx.send(());
            })
            .map_err(|source| SessionError::ThreadSpawn { name, source })?;
        Ok(Self { handle, done })
    }

    /// Wait up to `timeout` for the thread to finish, then join it.
    ///
    /// Returns false if the thread was left running: either it did not finish
    /// in time, or `join` was called from the thread itself.
    pub(crate) fn join(self, timeout: Duration) -> bool {
        let name = self.handle.thread().name().unwrap_or("worker").to_string();
        if self.handle.thread().id() == thread::current().id() {
            debug!(thread = %name, "close called from loop thread; not joining");
            return false;
        }

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    warn!(thread = %name, "loop thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(thread = %name, ?timeout, "loop thread did not exit in time; detaching");
                false
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("thread", &self.handle.thread().name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn joins_finished_thread() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let worker = Worker::spawn("test-join".to_string(), move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        assert!(worker.join(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn detaches_thread_that_overruns() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = Worker::spawn("test-slow".to_string(), move || {
            let _ = release_rx.recv();
        })
        .unwrap();

        assert!(!worker.join(Duration::from_millis(20)));
        drop(release_tx);
    }

    #[test]
    fn panicking_thread_is_still_joined() {
        let worker = Worker::spawn("test-panic".to_string(), || panic!("boom")).unwrap();
        assert!(worker.join(Duration::from_secs(5)));
    }
}
