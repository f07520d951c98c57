//! Host clock collaborator
//!
//! Timestamps returned by the engine are host milliseconds on this clock.
//! Device time is never compared against it directly; only device-reported
//! deltas are added to a host start time.

use std::time::Instant;

use parking_lot::Mutex;

/// A clock returning milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Monotonic clock counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock whose value is set by hand (host runtimes with their own timer, tests)
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Mutex::new(start_ms),
        }
    }

    pub fn set(&self, ms: f64) {
        *self.now.lock() = ms;
    }

    pub fn advance(&self, ms: f64) {
        *self.now.lock() += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_ms() > a);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100.0);
        clock.advance(25.5);
        assert_eq!(clock.now_ms(), 125.5);
        clock.set(0.0);
        assert_eq!(clock.now_ms(), 0.0);
    }
}
