//! Wall-clock and time-zone sources.
//!
//! The engine never calls `Utc::now()` directly; it asks its host, which
//! composes one of these. Tests and replays use [`ManualClock`].

use chrono::{FixedOffset, Local, Offset, Utc};
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self {
            millis: Rc::new(Cell::new(millis)),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.set(millis);
    }

    pub fn advance(&self, millis: i64) {
        self.millis.set(self.millis.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.get()
    }
}

pub trait TimeZoneSource {
    /// Offset from UTC in effect right now.
    fn current_offset(&self) -> FixedOffset;
}

/// The host's configured local zone, re-read on every call.
pub struct LocalTimeZone;

impl TimeZoneSource for LocalTimeZone {
    fn current_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// A pinned offset, e.g. from `clock.utc_offset_minutes` in the config.
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeZone(pub FixedOffset);

impl FixedTimeZone {
    /// `None` when the offset is outside +/- 24 hours.
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(FixedTimeZone)
    }
}

impl TimeZoneSource for FixedTimeZone {
    fn current_offset(&self) -> FixedOffset {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let other = clock.clone();
        clock.advance(250);
        assert_eq!(other.now_millis(), 1_250);
        other.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn test_fixed_zone_bounds() {
        let zone = FixedTimeZone::from_minutes(-300).unwrap();
        assert_eq!(zone.current_offset().local_minus_utc(), -18_000);
        assert!(FixedTimeZone::from_minutes(24 * 60).is_none());
    }
}
