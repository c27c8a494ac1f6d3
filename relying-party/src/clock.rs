use std::time::SystemTime;

/// Source of the current time. Expiry of challenges and session tokens is measured against it.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
pub trait Clock: Send + Sync {
    /// The current wall clock time.
    fn now(&self) -> SystemTime;
}

/// The operating system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
