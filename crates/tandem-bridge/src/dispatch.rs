//! Delivery of completion callbacks to the caller's execution context.
//!
//! Guest work finishes on a worker thread. A [`Dispatch`] decides where the
//! completion callback then runs: [`Inline`] runs it right there on the
//! worker, [`HostLoop`] queues it until the host pumps its loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::trace;

/// A queued completion.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where completion callbacks run.
pub trait Dispatch: Send + Sync {
    /// Called once when an invocation starts, before its completion is posted.
    fn begin(&self) {}

    /// Run or queue the completion of an invocation.
    fn post(&self, job: Job);
}

/// Runs completions on the worker that produced them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Dispatch for Inline {
    fn post(&self, job: Job) {
        job();
    }
}

/// A single-threaded host execution context.
///
/// Completions posted here do not run until the host calls
/// [`run_pending`](Self::run_pending) or [`run_until_idle`](Self::run_until_idle),
/// so callbacks never interleave with host code. The loop tracks invocations
/// that have started but whose completion has not yet run.
#[derive(Clone)]
pub struct HostLoop {
    shared: Arc<LoopShared>,
}

struct LoopShared {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<mpsc::UnboundedReceiver<Job>>,
    outstanding: AtomicUsize,
}

impl HostLoop {
    /// Create an empty loop.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(LoopShared {
                tx,
                rx: Mutex::new(rx),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Invocations started whose completion has not run yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    /// Run every completion already queued, without waiting. Returns how many
    /// ran. Returns 0 if the loop is already being pumped elsewhere.
    pub fn run_pending(&self) -> usize {
        let Ok(mut rx) = self.shared.rx.try_lock() else {
            return 0;
        };
        let mut ran: usize = 0;
        while let Ok(job) = rx.try_recv() {
            self.run(job);
            ran = ran.saturating_add(1);
        }
        ran
    }

    /// Run completions as they arrive until no invocation is outstanding.
    pub async fn run_until_idle(&self) {
        let mut rx = self.shared.rx.lock().await;
        while self.outstanding() > 0 {
            // The loop holds a sender, so the channel never closes.
            let Some(job) = rx.recv().await else {
                break;
            };
            self.run(job);
        }
    }

    fn run(&self, job: Job) {
        // Settles even if the callback panics.
        let _settle = Settle(&self.shared.outstanding);
        job();
    }
}

/// Marks one invocation finished when dropped.
struct Settle<'a>(&'a AtomicUsize);

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        trace!(
            outstanding = self.0.load(Ordering::SeqCst),
            "host loop ran completion"
        );
    }
}

impl Default for HostLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoop")
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl Dispatch for HostLoop {
    fn begin(&self) {
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    fn post(&self, job: Job) {
        // The receiver lives as long as `shared`, which we hold.
        let _ = self.shared.tx.send(job);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    #[test]
    fn test_inline_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        Inline.post(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_host_loop_defers_until_pumped() {
        let host = HostLoop::new();
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            host.begin();
            let ran = Arc::clone(&ran);
            host.post(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(host.outstanding(), 3);

        assert_eq!(host.run_pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(host.outstanding(), 0);
        assert_eq!(host.run_pending(), 0);
    }

    #[tokio::test]
    async fn test_run_until_idle_waits_for_late_completion() {
        let host = HostLoop::new();
        host.begin();

        let poster = host.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            poster.post(Box::new(|| {}));
        });

        host.run_until_idle().await;
        assert_eq!(host.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_panicking_completion_still_settles() {
        let host = HostLoop::new();
        host.begin();
        host.post(Box::new(|| panic!("callback failed")));

        let pumped = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| host.run_pending()));
        assert!(pumped.is_err());
        assert_eq!(host.outstanding(), 0);

        tokio::time::timeout(std::time::Duration::from_secs(1), host.run_until_idle())
            .await
            .unwrap();

        host.begin();
        host.post(Box::new(|| {}));
        assert_eq!(host.run_pending(), 1);
        assert_eq!(host.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_run_until_idle_returns_when_nothing_outstanding() {
        HostLoop::new().run_until_idle().await;
    }
}
