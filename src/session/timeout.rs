//! Cancellable one-shot session timeout.

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A scheduled one-shot task with an explicit cancellation token.
///
/// The task fires after `duration` unless cancelled first; dropping the
/// guard cancels it. Cancellation after the task has started firing is a
/// no-op race the callee must tolerate (the session controller checks its
/// generation before acting).
pub struct TimeoutGuard {
    cancel_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TimeoutGuard {
    /// Arm a timer that runs `on_expire` after `duration`.
    pub fn arm<F>(duration: Duration, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(duration) {
                on_expire();
            }
            // Ok(()) or Disconnected both mean cancelled.
        });

        Self {
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
        }
    }

    /// Cancel the timer. Idempotent; does not wait for the timer thread.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.cancel(); // dropping the sender also cancels, this is explicit
        if let Some(handle) = self.handle.take()
            && handle.is_finished()
            && handle.join().is_err()
        {
            tracing::warn!("timeout thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_fires_after_duration() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let _guard = TimeoutGuard::arm(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(100));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let mut guard = TimeoutGuard::arm(Duration::from_millis(30), move || {
            flag.store(true, Ordering::SeqCst);
        });
        guard.cancel();

        thread::sleep(Duration::from_millis(100));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let guard = TimeoutGuard::arm(Duration::from_millis(30), move || {
            flag.store(true, Ordering::SeqCst);
        });
        drop(guard);

        thread::sleep(Duration::from_millis(100));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut guard = TimeoutGuard::arm(Duration::from_millis(10), || {});
        guard.cancel();
        guard.cancel();
    }
}
