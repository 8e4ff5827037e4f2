//! Rate limiting for log emissions from hot paths.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Gate that opens at most once per period, one instance per call site.
///
/// The ingest callback and the synchronous update cycle can both fire many
/// times per second; wrapping their warnings in a throttle keeps the log
/// readable without dropping the first occurrence. Thread-safe, so a single
/// instance can be shared by the ingest task and the update cycle.
///
/// ```
/// use std::time::Duration;
/// use talus_costmap::throttle::Throttle;
///
/// let gate = Throttle::new(Duration::from_millis(200));
/// assert!(gate.ready());
/// assert!(!gate.ready()); // suppressed until the period elapses
/// ```
#[derive(Debug)]
pub struct Throttle {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Creates a gate that opens at most once per `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    /// Returns true when the caller should emit, consuming this period's slot.
    pub fn ready(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(at) if now.duration_since(at) < self.period => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_call_is_ready() {
        let gate = Throttle::new(Duration::from_secs(60));
        assert!(gate.ready());
        assert!(!gate.ready());
    }

    #[test]
    fn test_reopens_after_period() {
        let gate = Throttle::new(Duration::from_millis(5));
        assert!(gate.ready());
        std::thread::sleep(Duration::from_millis(10));
        assert!(gate.ready());
    }

    #[test]
    fn test_zero_period_never_suppresses() {
        let gate = Throttle::new(Duration::ZERO);
        assert!(gate.ready());
        assert!(gate.ready());
    }
}
