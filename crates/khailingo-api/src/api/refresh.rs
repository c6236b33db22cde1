//! Single-flight guard for session refresh
//!
//! Calls that see a 401 record the refresh generation they started under.
//! The first caller to reach the gate runs the refresh; callers that were
//! queued behind it find a newer generation and reuse its outcome instead of
//! refreshing again.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct LastRefresh {
    generation: u64,
    succeeded: bool,
}

#[derive(Debug, Default)]
pub struct RefreshGate {
    completed: AtomicU64,
    last: Mutex<LastRefresh>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refreshes completed so far
    ///
    /// Read this before sending a request and pass it to [`Self::run`] if the
    /// request comes back 401.
    pub fn generation(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Runs `refresh` unless one finished after `seen`, and returns the outcome
    pub async fn run<F, Fut>(&self, seen: u64, refresh: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut last = self.last.lock().await;

        if last.generation > seen {
            tracing::debug!(
                generation = last.generation,
                succeeded = last.succeeded,
                "Reusing concurrent refresh outcome"
            );
            return last.succeeded;
        }

        let succeeded = refresh().await;

        last.generation += 1;
        last.succeeded = succeeded;
        self.completed.store(last.generation, Ordering::Release);

        succeeded
    }
}
