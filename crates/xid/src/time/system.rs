use crate::TimeSource;
use std::time::{SystemTime, UNIX_EPOCH};

/// The operating system's wall clock.
///
/// Readings follow `SystemTime::now()`, including NTP steps in either
/// direction. A reading before 1970 is reported as `0`, which the encoder then
/// treats as a clock rollback.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.current_secs() > crate::CUSTOM_EPOCH.as_secs());
    }
}
