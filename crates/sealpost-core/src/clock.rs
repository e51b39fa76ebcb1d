//! Time source for message timestamps.
//!
//! The messenger never reads the system clock directly; it asks a
//! [`Clock`]. Production code uses [`SystemClock`], tests and replays
//! use [`ManualClock`].

use std::sync::Mutex;

use chrono::Duration;
use sealpost_types::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> Timestamp;
}

/// Reads the host's UTC clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    /// Starts the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Jumps to `timestamp`, which may be in the past.
    pub fn set(&self, timestamp: Timestamp) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = timestamp;
    }

    /// Moves the clock forward by `millis` milliseconds. Saturates at
    /// the largest representable time.
    pub fn advance_millis(&self, millis: i64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = current
            .as_datetime()
            .checked_add_signed(Duration::milliseconds(millis))
        {
            *current = Timestamp::from_datetime(next);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use sealpost_types::SealpostError;

    use super::*;

    #[test]
    fn manual_clock_moves_only_when_told() -> std::result::Result<(), SealpostError> {
        let clock = ManualClock::new(Timestamp::from_millis(1_000)?);
        assert_eq!(clock.now().timestamp_millis(), 1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);

        clock.advance_millis(250);
        assert_eq!(clock.now().timestamp_millis(), 1_250);

        clock.set(Timestamp::from_millis(5)?);
        assert_eq!(clock.now().timestamp_millis(), 5);
        Ok(())
    }

    #[test]
    fn system_clock_is_monotone_enough() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
