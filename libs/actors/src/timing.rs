//! Deadline arithmetic that tolerates unbounded durations.

use std::time::Duration;
use tokio::time::Instant;

/// Roughly thirty years; `Instant + Duration::MAX` would overflow.
pub(crate) const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + duration`, clamped so that very large durations mean "effectively never".
pub(crate) fn deadline_after(duration: Duration) -> Instant {
    Instant::now() + duration.min(FAR_FUTURE)
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_duration_clamps() {
        let deadline = deadline_after(Duration::MAX);
        assert!(deadline > Instant::now() + Duration::from_secs(86_400 * 365));
    }

    #[test]
    fn test_millis_saturate() {
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
    }
}
