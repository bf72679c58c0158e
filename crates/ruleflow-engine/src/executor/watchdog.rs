//! Wall-clock timeout enforcement.
//!
//! One watcher thread serves every execution of an executor. `arm` registers
//! a deadline and hands back a [`CancellationToken`]; when the deadline
//! elapses the watcher sets the token's flag, which script loops and
//! cooperative actions observe. The token also compares against its deadline
//! directly, so cancellation is detectable even between watcher wake-ups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

/// Cooperative cancellation handle for one execution.
#[derive(Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    disarmed: Arc<AtomicBool>,
    deadline: Instant,
}

impl CancellationToken {
    /// Whether the execution should stop: the watcher fired, or the deadline
    /// has passed.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || Instant::now() >= self.deadline
    }

    /// The raw flag, shared with evaluation scopes and custom actions.
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Withdraw the deadline; the watcher drops the entry without firing.
    pub fn disarm(&self) {
        self.disarmed.store(true, Ordering::Relaxed);
    }
}

struct Entry {
    deadline: Instant,
    flag: Arc<AtomicBool>,
    disarmed: Arc<AtomicBool>,
}

enum Command {
    Arm(Entry),
    Shutdown,
}

/// Background deadline watcher.
pub struct Watchdog {
    tx: Mutex<Sender<Command>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog").finish()
    }
}

impl Watchdog {
    /// Spawn the watcher thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("ruleflow-watchdog".into())
            .spawn(move || watch(rx))
            .expect("failed to spawn watchdog thread");

        Self {
            tx: Mutex::new(tx),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Register a deadline `timeout` from now.
    pub fn arm(&self, timeout: Duration) -> CancellationToken {
        let token = CancellationToken {
            flag: Arc::new(AtomicBool::new(false)),
            disarmed: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now() + timeout,
        };

        // If the watcher is gone the token still cancels via its deadline.
        let _ = self.tx.lock().send(Command::Arm(Entry {
            deadline: token.deadline,
            flag: Arc::clone(&token.flag),
            disarmed: Arc::clone(&token.disarmed),
        }));

        token
    }

    /// Stop the watcher thread, waiting for it to exit.
    pub fn shutdown(&self) {
        let _ = self.tx.lock().send(Command::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn watch(rx: Receiver<Command>) {
    let mut entries: Vec<Entry> = Vec::new();

    loop {
        let now = Instant::now();
        let wait = entries
            .iter()
            .map(|entry| entry.deadline.saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::from_millis(500));

        match rx.recv_timeout(wait) {
            Ok(Command::Arm(entry)) => entries.push(entry),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        entries.retain(|entry| {
            if entry.disarmed.load(Ordering::Relaxed) {
                return false;
            }
            if now >= entry.deadline {
                trace!("watchdog deadline elapsed, cancelling execution");
                entry.flag.store(true, Ordering::Relaxed);
                return false;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_fires_after_deadline() {
        let watchdog = Watchdog::new();
        let token = watchdog.arm(Duration::from_millis(20));
        assert!(!token.is_cancelled());

        std::thread::sleep(Duration::from_millis(60));
        assert!(token.is_cancelled());
        assert!(token.flag().load(Ordering::Relaxed));
    }

    #[test]
    fn disarmed_token_does_not_fire_the_flag() {
        let watchdog = Watchdog::new();
        let token = watchdog.arm(Duration::from_millis(20));
        token.disarm();

        std::thread::sleep(Duration::from_millis(60));
        assert!(!token.flag().load(Ordering::Relaxed));
    }

    #[test]
    fn deadline_check_works_without_watcher() {
        let watchdog = Watchdog::new();
        let token = watchdog.arm(Duration::from_millis(10));
        watchdog.shutdown();

        std::thread::sleep(Duration::from_millis(30));
        // The flag may never be set, but the deadline still cancels.
        assert!(token.is_cancelled());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let watchdog = Watchdog::new();
        watchdog.shutdown();
        watchdog.shutdown();
    }

    #[test]
    fn multiple_tokens_fire_independently() {
        let watchdog = Watchdog::new();
        let short = watchdog.arm(Duration::from_millis(10));
        let long = watchdog.arm(Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(50));
        assert!(short.is_cancelled());
        assert!(!long.is_cancelled());
    }
}
