//! Wall-clock source for session timestamps.
//!
//! Timestamps are seconds since the Unix epoch as `f64`, which is also the
//! on-disk representation in the state file and the history database.

use chrono::Utc;

pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Host wall clock. No monotonicity guarantee beyond what the host provides.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now() > 1_577_836_800.0);
    }
}
