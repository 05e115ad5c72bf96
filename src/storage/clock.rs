//! Server-side time source for report timestamps

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies nanoseconds since the Unix epoch
///
/// `None` means the current time cannot be represented as i64 nanoseconds.
pub trait Clock: Send + Sync {
    fn now_nanos(&self) -> Option<i64>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> Option<i64> {
        Utc::now().timestamp_nanos_opt()
    }
}

/// Manually driven clock; every reading advances it by `step`
#[derive(Debug)]
pub struct ManualClock {
    next: AtomicI64,
    step: i64,
}

impl ManualClock {
    pub fn starting_at(start: i64, step: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
            step,
        }
    }

    /// The timestamp the next reading will return
    pub fn peek(&self) -> i64 {
        self.next.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: i64) {
        self.next.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> Option<i64> {
        Some(self.next.fetch_add(self.step, Ordering::SeqCst))
    }
}
