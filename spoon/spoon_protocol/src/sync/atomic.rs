//! Atomic counters and signals shared between actors and the supervisor.
//!
//! None of these types take a lock; they are the read-only observation
//! surface the supervisor polls while actors run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter and return the new value.
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Reset the counter to zero and return the old value.
    pub fn reset(&self) -> u64 {
        self.value.swap(0, Ordering::SeqCst)
    }
}

/// A one-way stop signal checked by every actor once per loop iteration.
#[derive(Debug, Default)]
pub struct StopSignal {
    raised: AtomicBool,
}

impl StopSignal {
    /// Create a signal in the lowered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal.
    ///
    /// Returns true if this call raised it, false if it was already raised.
    pub fn raise(&self) -> bool {
        !self.raised.swap(true, Ordering::SeqCst)
    }

    /// Whether the signal has been raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// A shared budget of owner decisions.
///
/// Every actor takes one unit before it acts as owner. Once `limit` units
/// have been handed out, `try_take` fails for everyone.
#[derive(Debug)]
pub struct StepBudget {
    taken: AtomicU64,
    limit: u64,
}

impl StepBudget {
    /// Create a budget allowing `limit` steps.
    pub fn new(limit: u64) -> Self {
        Self {
            taken: AtomicU64::new(0),
            limit,
        }
    }

    /// Take one step from the budget.
    ///
    /// Returns the 1-based number of the step taken, or `None` when the
    /// budget is exhausted.
    pub fn try_take(&self) -> Option<u64> {
        self.taken
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |taken| {
                (taken < self.limit).then_some(taken + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    /// Number of steps handed out so far.
    pub fn taken(&self) -> u64 {
        self.taken.load(Ordering::SeqCst)
    }

    /// The configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Whether every step has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.taken() >= self.limit
    }
}
