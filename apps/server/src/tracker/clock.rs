//! Time source for execution timestamps.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for started/completed timestamps and durations.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whole minutes between `started_at` and `now`, rounded to nearest.
pub fn duration_minutes(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let millis = (now - started_at).num_milliseconds() as f64;
    (millis / 60_000.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(3));
        assert_eq!(clock.now(), start + Duration::minutes(3));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_duration_rounds_to_nearest_minute() {
        let start = Utc::now();
        assert_eq!(duration_minutes(start, start), 0);
        assert_eq!(duration_minutes(start, start + Duration::seconds(29)), 0);
        assert_eq!(duration_minutes(start, start + Duration::seconds(30)), 1);
        assert_eq!(duration_minutes(start, start + Duration::seconds(150)), 3);
        assert_eq!(duration_minutes(start, start + Duration::minutes(42)), 42);
    }
}
