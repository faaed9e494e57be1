//! Single-flight Module
//!
//! Collapses concurrent work for the same key into one execution whose result
//! is broadcast to every caller that arrived while it was running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{CacheError, Result};

type Calls<T> = HashMap<String, broadcast::Sender<Result<T>>>;

enum Role<T> {
    Leader(broadcast::Sender<Result<T>>),
    Follower(broadcast::Receiver<Result<T>>),
}

// == Single Flight ==
/// Per-key deduplication of in-flight work.
///
/// If the leading caller is dropped before finishing (cancelled or timed out),
/// its slot is released and waiting callers race to become the next leader, so
/// an abandoned call never leaves followers hanging.
#[derive(Debug)]
pub struct SingleFlight<T> {
    calls: Mutex<Calls<T>>,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` for `key` unless a call for the same key is already running,
    /// in which case the running call's result is awaited and returned instead.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut work = Some(work);

        loop {
            let role = {
                let mut calls = self.lock();
                match calls.get(key) {
                    Some(tx) => Role::Follower(tx.subscribe()),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        calls.insert(key.to_string(), tx.clone());
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Follower(mut rx) => match rx.recv().await {
                    Ok(result) => return result,
                    Err(_) => {
                        debug!(key, "in-flight leader went away, retrying");
                        continue;
                    }
                },
                Role::Leader(tx) => {
                    let Some(work) = work.take() else {
                        return Err(CacheError::Internal(
                            "single-flight work already consumed".to_string(),
                        ));
                    };

                    let mut slot = Slot {
                        flight: self,
                        key,
                        tx,
                        released: false,
                    };
                    let result = work().await;
                    slot.release();
                    // No receivers is fine: nobody joined this flight.
                    let _ = slot.tx.send(result.clone());
                    return result;
                }
            }
        }
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Calls<T>> {
        // The map is left consistent by every critical section, so a poisoned
        // lock is still safe to reuse.
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Leader's claim on a key. Dropping it unreleased frees the key.
struct Slot<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    key: &'a str,
    tx: broadcast::Sender<Result<T>>,
    released: bool,
}

impl<T: Clone> Slot<'_, T> {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut calls = self.flight.lock();
        if calls
            .get(self.key)
            .is_some_and(|current| current.same_channel(&self.tx))
        {
            calls.remove(self.key);
        }
    }
}

impl<T: Clone> Drop for Slot<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}
