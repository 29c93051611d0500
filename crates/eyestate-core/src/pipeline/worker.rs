//! Named single-consumer worker threads.

use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, warn};

/// A thread that applies a handler to every message on one channel.
///
/// Stopping signals the thread, lets it drain what is already queued and
/// joins it.
pub struct Worker {
    name: String,
    quit: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns `name`, calling `handler` for each message received on `rx`.
    ///
    /// The thread also exits once every sender of `rx` is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<M, F>(name: &str, rx: Receiver<M>, mut handler: F) -> Result<Self>
    where
        M: Send + 'static,
        F: FnMut(M) + Send + 'static,
    {
        let (quit, quit_rx) = bounded::<()>(0);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("{thread_name} worker started");
                loop {
                    select! {
                        recv(rx) -> msg => match msg {
                            Ok(msg) => handler(msg),
                            Err(_) => break,
                        },
                        recv(quit_rx) -> _ => {
                            for msg in rx.try_iter() {
                                handler(msg);
                            }
                            break;
                        }
                    }
                }
                debug!("{thread_name} worker stopped");
            })
            .with_context(|| format!("Failed to spawn {name} worker"))?;

        Ok(Self {
            name: name.to_string(),
            quit: Some(quit),
            handle: Some(handle),
        })
    }

    /// Thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True until [`Self::stop`] has joined the thread.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signals the thread, waits for it to drain and joins it.
    pub fn stop(&mut self) {
        drop(self.quit.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} worker panicked", self.name);
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_worker_handles_messages_in_order() {
        let (tx, rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let mut worker = Worker::spawn("order", rx, move |n: u32| {
            out_tx.send(n).unwrap();
        })
        .unwrap();

        for n in 0..10 {
            tx.send(n).unwrap();
        }
        worker.stop();

        let seen: Vec<u32> = out_rx.try_iter().collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stop_drains_and_joins_with_live_senders() {
        let (tx, rx) = unbounded();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let mut worker = Worker::spawn("drain", rx, move |()| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        worker.stop();
        assert!(!worker.is_running());
        assert_eq!(count.load(Ordering::SeqCst), 5);
        // Sender still alive; the worker must not have waited on it.
        drop(tx);
    }

    #[test]
    fn test_worker_exits_when_senders_drop() {
        let (tx, rx) = unbounded::<()>();
        let mut worker = Worker::spawn("orphan", rx, |()| {}).unwrap();
        drop(tx);
        worker.stop();
        assert_eq!(worker.name(), "orphan");
    }
}
