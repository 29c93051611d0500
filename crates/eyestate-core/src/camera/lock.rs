//! Binary permit serializing device open and close.
//!
//! The permit is a single token in a one-slot channel. Taking it is a bounded
//! receive; returning it happens when the [`Permit`] guard drops, so every
//! exit path of an open or close gives it back exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{trace, warn};

use crate::error::{CaptureError, LockOperation};

/// Longest an open or close waits for the permit.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(2500);

/// Mutual exclusion between device open and close.
pub struct OpenCloseLock {
    token: Receiver<()>,
    home: Sender<()>,
    timeout: Duration,
    releases: Arc<AtomicUsize>,
}

impl OpenCloseLock {
    /// Creates an unheld lock.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let (home, token) = bounded(1);
        let _ = home.try_send(());
        Self {
            token,
            home,
            timeout,
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Takes the permit, waiting at most the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::LockTimeout`] if the permit is not released in time.
    pub fn acquire(&self, operation: LockOperation) -> Result<Permit, CaptureError> {
        self.token
            .recv_timeout(self.timeout)
            .map_err(|_| CaptureError::LockTimeout {
                operation,
                waited: self.timeout,
            })?;
        trace!("camera lock acquired for {operation}");
        Ok(Permit {
            home: Some(self.home.clone()),
            releases: Arc::clone(&self.releases),
        })
    }

    /// True while some caller holds the permit.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.token.is_empty()
    }

    /// Number of times the permit has been returned.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Configured wait ceiling.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for OpenCloseLock {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

/// Proof of holding the open/close permit. Dropping it releases the permit.
#[must_use = "dropping the permit releases the camera lock"]
pub struct Permit {
    home: Option<Sender<()>>,
    releases: Arc<AtomicUsize>,
}

impl Permit {
    /// Releases the permit now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(home) = self.home.take() {
            if home.try_send(()).is_err() {
                warn!("camera lock released while not held");
                return;
            }
            self.releases.fetch_add(1, Ordering::SeqCst);
            trace!("camera lock released");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let lock = OpenCloseLock::default();
        assert!(!lock.is_held());

        let permit = lock.acquire(LockOperation::Open).unwrap();
        assert!(lock.is_held());

        permit.release();
        assert!(!lock.is_held());
        assert_eq!(lock.release_count(), 1);
    }

    #[test]
    fn test_second_acquire_times_out() {
        let lock = OpenCloseLock::new(Duration::from_millis(20));
        let _permit = lock.acquire(LockOperation::Open).unwrap();

        let err = lock.acquire(LockOperation::Close);
        assert!(matches!(
            err,
            Err(CaptureError::LockTimeout {
                operation: LockOperation::Close,
                ..
            })
        ));
    }

    #[test]
    fn test_release_from_other_thread_unblocks_waiter() {
        let lock = Arc::new(OpenCloseLock::new(Duration::from_secs(2)));
        let permit = lock.acquire(LockOperation::Open).unwrap();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            drop(permit);
        });

        assert!(lock.acquire(LockOperation::Close).is_ok());
        handle.join().unwrap();
    }
}
