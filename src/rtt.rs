//! Round-trip-time sampling.
//!
//! One sample is taken per acknowledged fragment: the time from its first
//! transmission to the ACK.  The statistics are purely diagnostic; the
//! retransmission timeout stays fixed at [`crate::config::Config::rto`].

use std::time::Duration;

/// A snapshot of the RTT statistics, in microseconds.
///
/// Before the first sample `min_us` is `i64::MAX` and `max_us` is
/// `i64::MIN`, so the first sample always sets both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttStats {
    pub last_us: i64,
    pub min_us: i64,
    pub max_us: i64,
    /// Number of samples recorded.
    pub samples: u64,
}

impl Default for RttStats {
    fn default() -> Self {
        Self {
            last_us: 0,
            min_us: i64::MAX,
            max_us: i64::MIN,
            samples: 0,
        }
    }
}

/// Tracks last / min / max RTT across acknowledged fragments.
#[derive(Debug, Default)]
pub struct RttSampler {
    stats: RttStats,
}

impl RttSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elapsed time between a transmission and its ACK.
    pub fn record(&mut self, elapsed: Duration) {
        let us = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
        let s = &mut self.stats;
        s.last_us = us;
        if us < s.min_us {
            s.min_us = us;
        }
        if us > s.max_us {
            s.max_us = us;
        }
        s.samples += 1;
        log::debug!("rtt {} minrtt: {} maxrtt: {}", s.last_us, s.min_us, s.max_us);
    }

    pub fn stats(&self) -> RttStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_bounds_are_infinite() {
        let stats = RttSampler::new().stats();
        assert_eq!(stats.min_us, i64::MAX);
        assert_eq!(stats.max_us, i64::MIN);
        assert_eq!(stats.samples, 0);
    }

    #[test]
    fn first_sample_sets_both_bounds() {
        let mut rtt = RttSampler::new();
        rtt.record(Duration::from_micros(250));
        let stats = rtt.stats();
        assert_eq!(stats.last_us, 250);
        assert_eq!(stats.min_us, 250);
        assert_eq!(stats.max_us, 250);
    }

    #[test]
    fn min_max_track_extremes() {
        let mut rtt = RttSampler::new();
        for us in [300, 100, 900, 400] {
            rtt.record(Duration::from_micros(us));
        }
        let stats = rtt.stats();
        assert_eq!(stats.last_us, 400);
        assert_eq!(stats.min_us, 100);
        assert_eq!(stats.max_us, 900);
        assert_eq!(stats.samples, 4);
    }
}
