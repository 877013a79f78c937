use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the `CreateTime` stamped on outbound envelopes.
pub trait UnixClock {
    /// Seconds since the Unix epoch.
    fn unix_now(&self) -> i64;
}

/// Zero-sized type, reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl UnixClock for SystemClock {
    fn unix_now(&self) -> i64 {
        // A clock set before 1970 is reported as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Always returns the same instant, so rendered envelopes are deterministic.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

#[cfg(test)]
impl UnixClock for FixedClock {
    fn unix_now(&self) -> i64 {
        self.0
    }
}
