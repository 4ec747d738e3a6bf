//! Outbound segment state for stop-and-wait reliability.
//!
//! [`Sender`] tracks the send sequence number and the single in-flight
//! segment.  It does **not** touch the socket;
//! [`crate::connection::Connection`] calls these methods and owns the actual
//! transmit / retransmit loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** segment is in flight at any moment (`unacked`).
//! - A new segment may only be sent once `unacked` is `None`.
//! - On ACK: advance `next_seq` by one; clear `unacked`.
//! - On timeout: increment `tx_count`; resend the same segment unchanged.

use std::net::SocketAddr;
use std::time::Instant;

use crate::segment::Segment;

/// A segment that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// The segment on the wire.
    pub segment: Segment,
    /// Where every (re)transmission goes.
    pub dest: SocketAddr,
    /// Encoded form, reused verbatim for every retransmission.
    pub bytes: Vec<u8>,
    /// How many times this segment has been transmitted (1 = first send).
    pub tx_count: u32,
    /// Time of the **first** transmission; RTT samples are measured from here.
    pub sent_at: Instant,
}

/// Stop-and-wait send-side state for one connection.
#[derive(Debug, Default)]
pub struct Sender {
    /// Sequence number of the **next** segment to send.
    ///
    /// Advances by one each time an ACK is received and stays unchanged
    /// while a segment is in flight.
    pub next_seq: u32,

    /// The in-flight segment, or `None` when the sender is idle.
    pub unacked: Option<RetransmitEntry>,
}

impl Sender {
    /// A sender whose first segment carries sequence number 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the PUSH segment for `payload` and place it in the in-flight
    /// slot.  Returns the bytes to transmit.
    ///
    /// Panics in debug mode if a segment is already in flight.
    pub fn record_sent(&mut self, payload: &[u8], dest: SocketAddr) -> &RetransmitEntry {
        debug_assert!(
            self.unacked.is_none(),
            "record_sent called while a segment is already in flight"
        );
        let segment = Segment::push(self.next_seq, payload.to_vec(), Some(dest));
        let bytes = segment.encode();
        self.unacked.insert(RetransmitEntry {
            segment,
            dest,
            bytes,
            tx_count: 1,
            sent_at: Instant::now(),
        })
    }

    /// Process an ACK for the in-flight segment.
    ///
    /// Returns the acknowledged entry, or `None` if the sender was idle
    /// (a stray ACK).  On success `next_seq` advances by one.
    pub fn on_ack(&mut self) -> Option<RetransmitEntry> {
        let entry = self.unacked.take()?;
        self.next_seq = self.next_seq.wrapping_add(1);
        Some(entry)
    }

    /// Increment the transmit count of the in-flight segment.
    ///
    /// Called by the connection loop before each retransmission.
    pub fn on_retransmit(&mut self) -> Option<&RetransmitEntry> {
        let entry = self.unacked.as_mut()?;
        entry.tx_count += 1;
        Some(entry)
    }

    /// Drop the in-flight segment without advancing `next_seq`.
    ///
    /// Only for a dead connection: a later segment would reuse the sequence
    /// number of one the peer may already have accepted.
    pub fn abandon(&mut self) {
        self.unacked = None;
    }

    /// Returns the number of times the in-flight segment has been sent,
    /// or `0` if the sender is idle.
    pub fn retransmit_count(&self) -> u32 {
        self.unacked.as_ref().map_or(0, |e| e.tx_count)
    }

    /// `true` when a segment is waiting for an ACK.
    pub fn has_unacked(&self) -> bool {
        self.unacked.is_some()
    }
}

/// Split `payload` into consecutive fragments of at most `mss` bytes.
///
/// An empty payload still yields one (empty) fragment so that it is
/// delivered as a zero-length message.
pub fn fragments(payload: &[u8], mss: usize) -> impl Iterator<Item = &[u8]> {
    let mss = mss.max(1);
    let empty = payload.is_empty().then_some(payload);
    payload.chunks(mss).chain(empty)
}
