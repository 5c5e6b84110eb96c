use core::time::Duration;
use std::sync::Arc;

/// Unix epoch: Thursday, January 1, 1970 00:00:00 UTC
pub const UNIX_EPOCH: Duration = Duration::from_secs(0);

/// Custom epoch: Wednesday, January 1, 2020 00:00:00 UTC
pub const CUSTOM_EPOCH: Duration = Duration::from_secs(1_577_836_800);

/// A trait for wall-clock time sources with second resolution.
///
/// The encoder compares consecutive readings to detect a clock that moved
/// backwards, so implementations should report real wall-clock time rather
/// than a value that is corrected after the fact. Tests plug in mocked clocks.
///
/// # Example
///
/// ```
/// use xid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_secs(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in whole seconds since the Unix epoch.
    fn current_secs(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }
}
