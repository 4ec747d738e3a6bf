//! Tunable protocol parameters.

use std::time::Duration;

use crate::connection::ConnError;

/// Default maximum payload bytes per fragment.
pub const DEFAULT_MSS: usize = 1400;

/// Default fixed retransmission timeout.
pub const DEFAULT_RTO: Duration = Duration::from_millis(100);

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest payload carried by one PUSH; larger sends are fragmented.
    pub mss: usize,
    /// Fixed retransmission timeout.  RTT samples never change it.
    pub rto: Duration,
    /// Upper bound on the single suspension of
    /// [`crate::connection::Connection::receive_one`].
    ///
    /// `None` waits for one data-available wake-up however long it takes.
    pub receive_wait: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mss: DEFAULT_MSS,
            rto: DEFAULT_RTO,
            receive_wait: None,
        }
    }
}

impl Config {
    pub fn with_mss(mut self, mss: usize) -> Self {
        self.mss = mss;
        self
    }

    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    pub fn with_receive_wait(mut self, wait: Option<Duration>) -> Self {
        self.receive_wait = wait;
        self
    }

    /// Reject settings the protocol cannot run with.
    pub fn validate(&self) -> Result<(), ConnError> {
        if self.mss == 0 {
            return Err(ConnError::InvalidConfig("mss must be at least 1 byte"));
        }
        if self.rto.is_zero() {
            return Err(ConnError::InvalidConfig("rto must be non-zero"));
        }
        Ok(())
    }
}
