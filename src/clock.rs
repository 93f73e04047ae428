use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock instants, in seconds since the UNIX epoch.
///
/// A scan samples its clock once and judges every object against that
/// snapshot, so implementations do not need to be cheap.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Reads `SystemTime`, keeping sub-second precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(err) => -err.duration().as_secs_f64(),
        }
    }
}

/// A clock pinned to one instant. Used for replays and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > 1_577_836_800.0);
    }

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = FixedClock(1000.25);
        assert_eq!(clock.now(), 1000.25);
        assert_eq!(clock.now(), clock.now());
    }
}
