//! Named wall-clock timers.
//!
//! Many timers may be open at once (one per in-flight transaction id plus
//! ad hoc per-statement names) without interfering with each other.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A set of independently named wall-clock timers.
#[derive(Debug, Default)]
pub struct Stopwatch {
    sections: Mutex<HashMap<String, Instant>>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer with the given name.
    pub fn start(&self, name: &str) {
        self.sections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_owned(), Instant::now());
    }

    /// Stop the named timer and return its elapsed event.
    ///
    /// Stopping a name that was never started yields a zero-duration event
    /// instead of failing; the observation path must never raise.
    pub fn stop(&self, name: &str) -> StopwatchEvent {
        let started = self
            .sections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);

        match started {
            Some(instant) => StopwatchEvent::new(instant.elapsed()),
            None => StopwatchEvent::new(Duration::ZERO),
        }
    }

    /// Discard every open timer.
    pub fn reset(&self) {
        self.sections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Elapsed time of one stopped timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopwatchEvent {
    duration: Duration,
}

impl StopwatchEvent {
    /// Build an event from a known duration. Public so classification can be
    /// driven with synthetic events in tests.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Elapsed time in milliseconds. All durations in log context use this
    /// unit.
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_returns_elapsed_time() {
        let stopwatch = Stopwatch::new();
        stopwatch.start("op");
        std::thread::sleep(Duration::from_millis(10));
        let event = stopwatch.stop("op");

        assert!(event.duration() >= Duration::from_millis(10));
    }

    #[test]
    fn unknown_name_stops_to_zero() {
        let stopwatch = Stopwatch::new();
        assert_eq!(stopwatch.stop("never-started").duration(), Duration::ZERO);
    }

    #[test]
    fn timers_do_not_interfere() {
        let stopwatch = Stopwatch::new();
        stopwatch.start("a");
        stopwatch.start("b");
        stopwatch.stop("a");

        std::thread::sleep(Duration::from_millis(5));
        assert!(stopwatch.stop("b").duration() >= Duration::from_millis(5));
    }

    #[test]
    fn reset_discards_open_timers() {
        let stopwatch = Stopwatch::new();
        stopwatch.start("a");
        stopwatch.reset();

        assert_eq!(stopwatch.stop("a").duration(), Duration::ZERO);
    }

    #[test]
    fn duration_ms_converts() {
        let event = StopwatchEvent::new(Duration::from_millis(1500));
        assert_eq!(event.duration_ms(), 1500.0);
    }
}
