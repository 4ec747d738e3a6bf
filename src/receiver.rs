//! Stop-and-wait receive-side state machine.
//!
//! [`Receiver`] classifies each inbound PUSH against the next expected
//! sequence number:
//!
//! - `seq == expected` — **accepted**; the caller queues the payload and
//!   sends an ACK.  `expected` advances by one.
//! - `seq <  expected` — **duplicate** of data already delivered; the caller
//!   re-sends an ACK (the previous one may have been lost) but does not
//!   queue the payload again.
//! - `seq >  expected` — **ahead** of the stream; dropped without an ACK.
//!   There is no reorder buffer, the sender's retransmission fills the gap.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

/// Outcome of [`Receiver::on_push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Duplicate,
    Ahead,
}

impl Verdict {
    /// Whether the caller must answer this segment with an ACK.
    pub fn needs_ack(self) -> bool {
        !matches!(self, Verdict::Ahead)
    }
}

/// Receive-side sequence state for one connection.
#[derive(Debug, Default)]
pub struct Receiver {
    /// Sequence number of the next PUSH that will be accepted.
    expected: u32,
}

impl Receiver {
    /// A receiver expecting sequence number 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a PUSH carrying `seq`, advancing the expected sequence
    /// number when it is accepted.
    pub fn on_push(&mut self, seq: u32) -> Verdict {
        if seq > self.expected {
            Verdict::Ahead
        } else if seq < self.expected {
            Verdict::Duplicate
        } else {
            self.expected = self.expected.wrapping_add(1);
            Verdict::Accepted
        }
    }

    /// Sequence number the next accepted PUSH must carry.
    pub fn expected(&self) -> u32 {
        self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_push_is_accepted() {
        let mut rx = Receiver::new();
        assert_eq!(rx.expected(), 0);
        assert_eq!(rx.on_push(0), Verdict::Accepted);
        assert_eq!(rx.expected(), 1);
    }

    #[test]
    fn redelivered_push_is_duplicate_and_acked() {
        let mut rx = Receiver::new();
        rx.on_push(0);
        rx.on_push(1);

        let verdict = rx.on_push(0);
        assert_eq!(verdict, Verdict::Duplicate);
        assert!(verdict.needs_ack());
        assert_eq!(rx.expected(), 2);
    }

    #[test]
    fn push_ahead_is_dropped_without_ack() {
        let mut rx = Receiver::new();
        let verdict = rx.on_push(1);
        assert_eq!(verdict, Verdict::Ahead);
        assert!(!verdict.needs_ack());
        assert_eq!(rx.expected(), 0);
    }

    #[test]
    fn in_order_stream_advances_one_per_segment() {
        let mut rx = Receiver::new();
        for seq in 0..10 {
            assert_eq!(rx.on_push(seq), Verdict::Accepted);
        }
        assert_eq!(rx.expected(), 10);
    }
}
