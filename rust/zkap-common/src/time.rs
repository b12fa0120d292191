//! Clock abstraction.
//!
//! Lease checks compare against "now". Everything that needs the current time
//! asks a [`Clock`] so tests can pin or advance it.

use std::sync::Arc;

use parking_lot::RwLock;

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// A [`Clock`] backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// give another to the code under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<SystemTime>>,
}

impl ManualClock {
    /// Creates a clock reading `now`.
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Creates a clock reading `seconds` after the Unix epoch.
    pub fn from_unix_seconds(seconds: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    /// Sets the clock to `now`.
    pub fn set(&self, now: SystemTime) {
        *self.now.write() = now;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.read()
    }
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> SystemTime {
        C::now(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_reasonable_timestamp() {
        let nanos = SystemClock
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        // Should be after year 2020 (in nanoseconds)
        let year_2020_nanos: u128 = 1577836800 * 1_000_000_000;
        assert!(nanos > year_2020_nanos);
    }

    #[test]
    fn it_only_moves_a_manual_clock_when_advanced() {
        let clock = ManualClock::from_unix_seconds(1_000);
        let handle = clock.clone();

        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(1_000));

        handle.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(1_030));

        handle.set(UNIX_EPOCH);
        assert_eq!(clock.now(), UNIX_EPOCH);
    }

    #[test]
    fn it_reads_through_shared_clocks() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::from_unix_seconds(7));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(7));
    }
}
