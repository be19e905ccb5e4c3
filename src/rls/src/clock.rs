//! Wall-clock source for time windows and record stamping

use chrono::{DateTime, Duration, FixedOffset, Local, Utc};
use std::sync::RwLock;

/// Source of the current wall-clock time.
///
/// The offset of the returned value is the one the engine treats as "local"
/// when checking policy time windows.
pub trait Clock: Send + Sync {
    /// Current time with the evaluating host's offset
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current time in UTC, used for `createdAt`/`updatedAt`/`timestamp`
    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// Clock backed by the host's local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let now = Local::now();
        now.with_timezone(now.offset())
    }
}

/// Manually driven clock for tests and replay tooling
#[derive(Debug)]
pub struct FixedClock {
    current: RwLock<DateTime<FixedOffset>>,
}

impl FixedClock {
    /// Create a clock frozen at `at`
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self {
            current: RwLock::new(at),
        }
    }

    /// Parse an RFC 3339 timestamp, e.g. `2024-03-04T08:00:00+01:00`
    pub fn at_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(Self::new)
    }

    /// Move the clock to `at`
    pub fn set(&self, at: DateTime<FixedOffset>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = at;
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = *current + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}
