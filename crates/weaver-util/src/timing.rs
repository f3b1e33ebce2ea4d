//! RAII timing for action handlers and other slow operations.
//!
//! ```rust,ignore
//! let _timing = TimingGuard::action("shell", &action_id);
//! // Duration is logged when _timing is dropped
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Logs how long it lived when dropped.
///
/// Short operations log at debug, slower ones at info, and anything past
/// the warn threshold at warn.
pub struct TimingGuard {
    kind: &'static str,
    name: String,
    start: Instant,
    info_threshold: Duration,
    warn_threshold: Duration,
}

impl TimingGuard {
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            start: Instant::now(),
            info_threshold: Duration::from_millis(100),
            warn_threshold: Duration::from_secs(30),
        }
    }

    /// Guard for one executed action.
    pub fn action(action_type: &str, action_id: impl std::fmt::Display) -> Self {
        Self::new("action", format!("{action_type}:{action_id}"))
    }

    pub fn with_info_threshold(mut self, threshold: Duration) -> Self {
        self.info_threshold = threshold;
        self
    }

    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = threshold;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Human-friendly rendering: `850ms`, `2.40s`, `3m 12.0s`.
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) as f64 / 1000.0;
        format!("{mins}m {secs:.1}s")
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration = format_duration(elapsed);
        let duration_ms = elapsed.as_millis() as u64;

        if elapsed >= self.warn_threshold {
            warn!(kind = self.kind, name = %self.name, duration_ms, duration = %duration, "Slow operation completed");
        } else if elapsed >= self.info_threshold {
            info!(kind = self.kind, name = %self.name, duration_ms, duration = %duration, "Operation completed");
        } else {
            debug!(kind = self.kind, name = %self.name, duration_ms, duration = %duration, "Operation completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(2400)), "2.40s");
        assert_eq!(format_duration(Duration::from_millis(192_000)), "3m 12.0s");
    }

    #[test]
    fn test_guard_measures_elapsed() {
        let guard = TimingGuard::action("file", "msg-1:0")
            .with_info_threshold(Duration::from_millis(1))
            .with_warn_threshold(Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed() >= Duration::from_millis(5));
    }
}
