//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (command, sequence number, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw datagram back into a [`Segment`], returning a
//!   [`SegmentError`] for malformed input.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3               4
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-
//! |    Command    |                Sequence Number                | Payload ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-
//! ```
//!
//! Header size: [`HEADER_LEN`] = 5 bytes.  An acknowledgment is always
//! encoded as a single command byte (the *compact ACK*); decoders also
//! accept the full 5-byte form of an ACK and ignore its sequence number.

use std::net::SocketAddr;

use thiserror::Error;

/// Byte length of the command field.
pub const CMD_LEN: usize = 1;

/// Byte length of the sequence-number field.
pub const SEQ_LEN: usize = 4;

/// Byte length of the full header on the wire.
pub const HEADER_LEN: usize = CMD_LEN + SEQ_LEN;

// Byte offsets of each field within the serialised header.
const OFF_CMD: usize = 0;
const OFF_SEQ: usize = CMD_LEN;

/// The two segment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Data-bearing segment; must be acknowledged.
    Push = 1,
    /// Acknowledgment; carries no payload.
    Ack = 2,
}

impl Command {
    /// Wire code of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    fn from_code(code: u8) -> Result<Self, SegmentError> {
        match code {
            1 => Ok(Command::Push),
            2 => Ok(Command::Ack),
            other => Err(SegmentError::UnknownCommand(other)),
        }
    }
}

/// A decoded protocol datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub command: Command,
    /// Sequence number; meaningless (and left at 0) for [`Command::Ack`].
    pub seq: u32,
    /// Application bytes; always empty for [`Command::Ack`].
    pub payload: Vec<u8>,
    /// Peer this segment came from, or is bound for.
    ///
    /// `None` is only valid when the transport is connected to one peer.
    pub remote: Option<SocketAddr>,
}

impl Segment {
    /// Build a data segment.
    pub fn push(seq: u32, payload: Vec<u8>, remote: Option<SocketAddr>) -> Self {
        Self {
            command: Command::Push,
            seq,
            payload,
            remote,
        }
    }

    /// Build an acknowledgment addressed to `remote`.
    pub fn ack(remote: Option<SocketAddr>) -> Self {
        Self {
            command: Command::Ack,
            seq: 0,
            payload: Vec::new(),
            remote,
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    ///
    /// ACKs are always compact (one byte); any sequence number or payload
    /// stored on an ACK segment is not written.
    pub fn encode(&self) -> Vec<u8> {
        if self.command == Command::Ack {
            return vec![Command::Ack.code()];
        }

        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_CMD] = self.command.code();
        buf[OFF_SEQ..OFF_SEQ + SEQ_LEN].copy_from_slice(&self.seq.to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Segment`] received from `remote`.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`] and is not a compact ACK,
    /// - the command byte is neither PUSH nor ACK.
    pub fn decode(buf: &[u8], remote: Option<SocketAddr>) -> Result<Self, SegmentError> {
        if buf.len() == CMD_LEN && buf[OFF_CMD] == Command::Ack.code() {
            return Ok(Self::ack(remote));
        }

        if buf.len() < HEADER_LEN {
            return Err(SegmentError::InvalidOverhead { len: buf.len() });
        }

        match Command::from_code(buf[OFF_CMD])? {
            Command::Ack => Ok(Self::ack(remote)),
            Command::Push => {
                let mut seq = [0u8; SEQ_LEN];
                seq.copy_from_slice(&buf[OFF_SEQ..OFF_SEQ + SEQ_LEN]);
                Ok(Self::push(
                    u32::from_be_bytes(seq),
                    buf[HEADER_LEN..].to_vec(),
                    remote,
                ))
            }
        }
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SegmentError {
    /// Datagram too short to hold the header (and not a compact ACK).
    #[error("invalid overhead: {len} byte(s), header needs {HEADER_LEN}")]
    InvalidOverhead { len: usize },
    /// Command byte is not a known command.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
}
