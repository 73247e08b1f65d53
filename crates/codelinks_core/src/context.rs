//! Ambient services resolved by repository constructors.
//!
//! # Responsibility
//! - Identify the acting user for audit columns.
//! - Provide the clock used for audit timestamps.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identity written to `created_by` / `updated_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: Option<Uuid>,
    pub username: String,
}

impl CurrentUser {
    pub fn new(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            username: username.into(),
        }
    }

    /// Identity used by maintenance tasks and the CLI.
    pub fn system() -> Self {
        Self {
            user_id: None,
            username: "system".to_string(),
        }
    }
}

/// Source of audit timestamps in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Deterministic clock that advances by `step_ms` on every reading.
#[derive(Debug)]
pub struct ManualClock {
    next_ms: Cell<i64>,
    step_ms: i64,
}

impl ManualClock {
    pub fn new(start_ms: i64, step_ms: i64) -> Self {
        Self {
            next_ms: Cell::new(start_ms),
            step_ms,
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        let now = self.next_ms.get();
        self.next_ms.set(now + self.step_ms);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock, SystemClock};

    #[test]
    fn manual_clock_advances_by_step() {
        let clock = ManualClock::new(1_000, 5);
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(clock.now_ms(), 1_005);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
