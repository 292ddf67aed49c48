//! Outstanding-work counters that can be awaited until they drain.

use std::sync::Arc;

use tokio::sync::watch;

/// Counts outstanding units of work; [`wait`](Self::wait) resolves at zero.
///
/// Clones share one counter.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionTracker {
    /// Creates a tracker with nothing outstanding.
    #[must_use]
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Registers one unit of work.
    pub fn add(&self) {
        self.count.send_modify(|n| *n += 1);
    }

    /// Marks one unit of work finished. Extra calls never go below zero.
    pub fn done(&self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Returns the number of outstanding units.
    #[must_use]
    pub fn pending(&self) -> usize {
        *self.count.borrow()
    }

    /// Waits until nothing is outstanding. Returns immediately at zero.
    pub async fn wait(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Registers one unit of work, finished when the guard drops.
    #[must_use]
    pub fn guard(&self) -> CompletionGuard {
        self.add();
        self.adopt()
    }

    /// Takes over a unit already registered with [`add`](Self::add).
    #[must_use]
    pub(crate) fn adopt(&self) -> CompletionGuard {
        CompletionGuard {
            tracker: self.clone(),
        }
    }
}

/// Marks its unit of work finished on drop, including during a panic unwind.
#[derive(Debug)]
pub struct CompletionGuard {
    tracker: CompletionTracker,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.tracker.done();
    }
}
