//! A memoized async initializer with collapsing waiters.
//!
//! # State machine
//!
//! ```text
//! Uninitialized ──► Initializing ──► Ready
//!        ▲               │
//!        │               ▼
//!        └──────────── Failed  (next caller retries)
//! ```
//!
//! Callers that arrive while an attempt is in flight queue on the gate and
//! observe that attempt's outcome: its value on success, a clone of its error
//! on failure. Only a caller arriving after a failure has completed starts a
//! new attempt. A `Ready` value is read without touching the gate.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use tokio::sync::Mutex;

use crate::error::TransformError;

/// Observable lifecycle of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Uninitialized,
    Initializing,
    Ready,
    /// The last attempt failed; the next caller will retry.
    Failed,
}

pub(crate) struct Slot<T> {
    ready: OnceLock<T>,
    /// Serializes attempts and holds the error of the most recent one.
    gate: Mutex<Option<TransformError>>,
    /// Number of completed failed attempts.
    failures: AtomicU64,
    initializing: AtomicBool,
}

impl<T: Clone> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            ready: OnceLock::new(),
            gate: Mutex::new(None),
            failures: AtomicU64::new(0),
            initializing: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> SlotState {
        if self.ready.get().is_some() {
            SlotState::Ready
        } else if self.initializing.load(Ordering::Acquire) {
            SlotState::Initializing
        } else if self.failures.load(Ordering::Acquire) > 0 {
            SlotState::Failed
        } else {
            SlotState::Uninitialized
        }
    }

    /// Return the cached value, running `init` first if no attempt has
    /// succeeded yet.
    ///
    /// `init` is only invoked by the caller that wins the gate; every other
    /// concurrent caller shares its outcome.
    pub(crate) async fn get_or_try_init<F, Fut>(&self, init: F) -> Result<T, TransformError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransformError>>,
    {
        if let Some(value) = self.ready.get() {
            return Ok(value.clone());
        }

        let observed_failures = self.failures.load(Ordering::Acquire);
        let mut last_failure = self.gate.lock().await;

        if let Some(value) = self.ready.get() {
            return Ok(value.clone());
        }
        // An attempt failed while we were queued: report it rather than retry
        if self.failures.load(Ordering::Acquire) != observed_failures {
            if let Some(error) = last_failure.as_ref() {
                return Err(error.clone());
            }
        }

        let outcome = {
            let _initializing = InitializingFlag::raise(&self.initializing);
            init().await
        };

        match outcome {
            Ok(value) => {
                *last_failure = None;
                // Cannot already be set: writers hold the gate
                let _ = self.ready.set(value.clone());
                Ok(value)
            }
            Err(error) => {
                *last_failure = Some(error.clone());
                self.failures.fetch_add(1, Ordering::AcqRel);
                Err(error)
            }
        }
    }
}

/// Marks a slot as initializing for the lifetime of one attempt, including
/// an attempt whose future is dropped part-way.
struct InitializingFlag<'a>(&'a AtomicBool);

impl<'a> InitializingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InitializingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
