//! Latest-value debouncer
//!
//! Keeps the most recent value and when it arrived. A value is released once
//! nothing newer has arrived for a full window, and only if it differs from the
//! previously released one. The caller drives it from a recurring timer.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(T, Instant)>,
    last_emitted: Option<T>,
}

impl<T: Clone + PartialEq> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_emitted: None,
        }
    }

    /// Buffer `value`, replacing anything pending and restarting the window
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now));
    }

    /// Release the pending value if its window has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let (_, arrived) = self.pending.as_ref()?;
        if now.saturating_duration_since(*arrived) < self.window {
            return None;
        }

        let (value, _) = self.pending.take()?;
        if self.last_emitted.as_ref() == Some(&value) {
            return None;
        }
        self.last_emitted = Some(value.clone());
        Some(value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_emitted(&self) -> Option<&T> {
        self.last_emitted.as_ref()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_releases_after_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(500));

        debouncer.push("loading", start);
        assert_eq!(debouncer.poll(start + ms(499)), None);
        assert_eq!(debouncer.poll(start + ms(500)), Some("loading"));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_burst_keeps_latest_only() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(500));

        debouncer.push("loading", start);
        debouncer.push("idle", start + ms(100));
        assert_eq!(debouncer.poll(start + ms(550)), None);
        assert_eq!(debouncer.poll(start + ms(600)), Some("idle"));
    }

    #[test]
    fn test_repeated_value_is_suppressed() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(10));

        debouncer.push(1, start);
        assert_eq!(debouncer.poll(start + ms(10)), Some(1));

        debouncer.push(1, start + ms(20));
        assert_eq!(debouncer.poll(start + ms(40)), None);
        assert_eq!(debouncer.last_emitted(), Some(&1));
    }

    #[test]
    fn test_zero_window() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);

        debouncer.push('a', start);
        assert_eq!(debouncer.poll(start), Some('a'));
        assert_eq!(debouncer.poll(start), None);
    }
}
