//! Backoff pauser for idle tail loops.

use std::thread;
use std::time::Duration;

/// Sleeps with exponential backoff between a floor and a ceiling.
///
/// Tail loops pause when the journal has nothing new and reset on any
/// successful read, keeping idle wakeups bounded without adding much latency
/// under load.
pub struct Pauser {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Pauser {
    /// A pauser backing off between `floor` and `ceiling`.
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Convenience constructor in milliseconds.
    pub fn millis(floor_ms: u64, ceiling_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(floor_ms),
            Duration::from_millis(ceiling_ms),
        )
    }

    /// Sleeps for the current backoff, then doubles it toward the ceiling.
    pub fn pause(&mut self) {
        thread::sleep(self.current);
        self.current = (self.current * 2).min(self.ceiling);
    }

    /// Returns the backoff to the floor.
    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    /// The sleep the next `pause` would take.
    pub fn current(&self) -> Duration {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut pauser = Pauser::millis(1, 4);
        assert_eq!(pauser.current(), Duration::from_millis(1));
        pauser.pause();
        assert_eq!(pauser.current(), Duration::from_millis(2));
        pauser.pause();
        assert_eq!(pauser.current(), Duration::from_millis(4));
        pauser.pause();
        assert_eq!(pauser.current(), Duration::from_millis(4));
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut pauser = Pauser::millis(1, 8);
        pauser.pause();
        pauser.pause();
        pauser.reset();
        assert_eq!(pauser.current(), Duration::from_millis(1));
    }

    #[test]
    fn test_ceiling_not_below_floor() {
        let pauser = Pauser::millis(10, 1);
        assert_eq!(pauser.current(), Duration::from_millis(10));
    }
}
