//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed reconciliations. The sequence grows
//! more slowly than exponential backoff: min, min, 2min, 3min, 5min, ...
//! capped at a maximum. State is kept per cluster name and reset on success.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, in whole seconds.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Previous backoff value in seconds
    prev_seconds: u64,
    /// Current backoff value in seconds
    current_seconds: u64,
    /// Maximum backoff value in seconds
    max_seconds: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff bounded by `min` and `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_seconds = min.as_secs().max(1);
        Self {
            prev_seconds: 0,
            current_seconds: min_seconds,
            max_seconds: max.as_secs().max(min_seconds),
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_seconds;

        let next = self.prev_seconds.saturating_add(self.current_seconds);
        self.prev_seconds = self.current_seconds;
        self.current_seconds = std::cmp::min(next, self.max_seconds);

        Duration::from_secs(result)
    }
}

/// Backoff state per cluster name.
#[derive(Debug)]
pub struct BackoffTracker {
    min: Duration,
    max: Duration,
    entries: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Delay before retrying `name` after another consecutive failure
    pub fn next(&self, name: &str) -> Duration {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .entry(name.to_string())
            .or_insert_with(|| FibonacciBackoff::new(self.min, self.max))
            .next_backoff()
    }

    /// Forget the failure streak of `name`; the next failure starts over at `min`
    pub fn reset(&self, name: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::new(secs(5), secs(300));

        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(10));
        assert_eq!(backoff.next_backoff(), secs(15));
        assert_eq!(backoff.next_backoff(), secs(25));
        assert_eq!(backoff.next_backoff(), secs(40));
    }

    #[test]
    fn test_fibonacci_backoff_max_cap() {
        let mut backoff = FibonacciBackoff::new(secs(1), secs(10));

        let seen: Vec<u64> = (0..9).map(|_| backoff.next_backoff().as_secs()).collect();
        // Next would be 13, but is capped
        assert_eq!(seen, vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
    }

    #[test]
    fn test_tracker_is_per_name() {
        let tracker = BackoffTracker::new(secs(5), secs(300));

        assert_eq!(tracker.next("east-1"), secs(5));
        assert_eq!(tracker.next("east-1"), secs(5));
        assert_eq!(tracker.next("east-1"), secs(10));
        // a different cluster starts its own streak
        assert_eq!(tracker.next("west-2"), secs(5));

        tracker.reset("east-1");
        assert_eq!(tracker.next("east-1"), secs(5));
    }

    #[test]
    fn test_tracker_reset_keeps_other_streaks() {
        let tracker = BackoffTracker::new(secs(1), secs(10));

        for _ in 0..4 {
            tracker.next("east-1");
            tracker.next("west-2");
        }
        tracker.reset("east-1");

        assert_eq!(tracker.next("east-1"), secs(1));
        assert_eq!(tracker.next("west-2"), secs(5));
    }
}
