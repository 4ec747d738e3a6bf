//! `stop-and-wait` — reliable, in-order delivery over UDP datagrams.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   PUSH seq=n   ┌──────────┐
//!  │  Sender  │───────────────▶│ Receiver │──▶ DeliveryQueue ──▶ app
//!  └────┬─────┘                └─────┬────┘
//!       │          ACK               │
//!       │◀───────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │           Connection              │
//!  │ (send loop + receive loop task)   │
//!  └────┬──────────────────────────────┘
//!       │ raw datagrams
//!  ┌────▼──────┐
//!  │ Transport │  (tokio UdpSocket, or a fault-injecting Simulator)
//!  └───────────┘
//! ```
//!
//! At most one fragment is in flight; the sender retransmits it on a fixed
//! timeout until an ACK arrives.
//!
//! Each module has a single responsibility:
//! - [`segment`]     — wire format (serialise / deserialise)
//! - [`connection`]  — send state machine, receive loop, public API
//! - [`sender`]      — outbound sequence state and fragmentation
//! - [`receiver`]    — inbound sequence classification
//! - [`delivery`]    — in-order queue of accepted payloads
//! - [`rtt`]         — round-trip-time diagnostics
//! - [`config`]      — MSS, RTO and receive wait window
//! - [`socket`]      — transport trait and async UDP socket
//! - [`simulator`]   — lossy/duplicating transport for testing

pub mod config;
pub mod connection;
pub mod delivery;
pub mod receiver;
pub mod rtt;
pub mod segment;
pub mod sender;
pub mod simulator;
pub mod socket;

pub use config::Config;
pub use connection::{ConnError, Connection};
pub use rtt::RttStats;
pub use segment::{Command, Segment, SegmentError};
pub use socket::{Socket, Transport};
