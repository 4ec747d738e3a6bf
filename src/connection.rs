//! Stop-and-wait connection: send state machine + receive loop.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │ send(data, dest)                 receive_one()
//!      ▼                                        ▲
//!  Connection ── Sender (seq, in-flight) ──┐    │
//!      │            ▲ ack_signal           │    │ DeliveryQueue + ready
//!      │            │                      │    │
//!      │      receive loop task ───────────┼────┘
//!      │        └── Receiver (expected seq)│
//!      ▼                                   ▼
//!  Arc<Transport> (shared with the background task)
//! ```
//!
//! A [`Connection`] spawns one background task that reads every inbound
//! datagram.  ACKs wake the sender; PUSH segments are classified by
//! [`Receiver`], acknowledged and queued.  [`Connection::send`] runs in the
//! caller's task and drives one fragment at a time to acknowledgment,
//! retransmitting on a fixed timeout with no retry limit.
//!
//! ```ignore
//! let conn = Connection::new(socket, Config::default())?;
//! conn.send(b"hello", peer).await?;
//! let reply = conn.receive_one().await?;
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::delivery::DeliveryQueue;
use crate::receiver::{Receiver, Verdict};
use crate::rtt::{RttSampler, RttStats};
use crate::segment::{Command, Segment, HEADER_LEN};
use crate::sender::{fragments, Sender};
use crate::socket::{Transport, MAX_DATAGRAM};

/// Errors surfaced by [`Connection`] operations.
#[derive(Debug, Error)]
pub enum ConnError {
    /// The transport failed to read; the receive loop has stopped.
    #[error("transport read failed: {0}")]
    Io(#[from] io::Error),
    /// `receive_one` found nothing after its single wait.
    #[error("no payload available, try again")]
    WouldBlock,
    /// The receive loop has terminated; the connection cannot make progress.
    #[error("connection closed")]
    Closed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// State shared between the caller-facing handle and the receive loop.
#[derive(Debug)]
struct Shared<T> {
    transport: T,
    queue: DeliveryQueue,
    /// Raised once per inbound ACK; only a currently waiting sender sees it.
    ack_signal: Notify,
    rtt: Mutex<RttSampler>,
    /// Mirror of the receive loop's expected sequence number.
    expected: AtomicU32,
    last_peer: Mutex<Option<SocketAddr>>,
    closed: AtomicBool,
}

impl<T: Transport> Shared<T> {
    /// Write one encoded segment.  Write errors are logged and absorbed;
    /// retransmission is the recovery.
    ///
    /// A pre-connected transport ignores `dest` and writes to its peer.
    async fn transmit(&self, bytes: &[u8], dest: SocketAddr) {
        let res = match self.transport.peer_addr() {
            Some(_) => self.transport.send(bytes).await,
            None => self.transport.send_to(bytes, dest).await,
        };
        if let Err(e) = res {
            log::warn!("transmit of {} byte(s) failed: {e}", bytes.len());
        }
    }

    fn record_rtt(&self, elapsed: Duration) {
        self.rtt
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .record(elapsed);
    }

    fn set_last_peer(&self, peer: SocketAddr) {
        *self.last_peer.lock().unwrap_or_else(|p| p.into_inner()) = Some(peer);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A reliable, in-order, stop-and-wait endpoint over a datagram transport.
///
/// Must be created inside a tokio runtime.  Dropping the handle stops the
/// receive loop.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    shared: Arc<Shared<T>>,
    /// Serialises `send` callers so only one fragment is ever in flight.
    sender: AsyncMutex<Sender>,
    config: Config,
    receive_loop: Option<JoinHandle<Result<(), ConnError>>>,
}

impl<T: Transport> Connection<T> {
    /// Wrap `transport` and start the background receive loop.
    pub fn new(transport: T, config: Config) -> Result<Self, ConnError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            transport,
            queue: DeliveryQueue::new(),
            ack_signal: Notify::new(),
            rtt: Mutex::new(RttSampler::new()),
            expected: AtomicU32::new(0),
            last_peer: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            let res = receive_loop(&loop_shared).await;
            loop_shared.closed.store(true, Ordering::Release);
            // Let a suspended consumer observe the closed state.
            loop_shared.queue.wake();
            res
        });

        Ok(Self {
            shared,
            sender: AsyncMutex::new(Sender::new()),
            config,
            receive_loop: Some(handle),
        })
    }

    // -----------------------------------------------------------------------
    // Data transfer
    // -----------------------------------------------------------------------

    /// Deliver `payload` to `dest`, returning once every fragment has been
    /// acknowledged.
    ///
    /// Payloads larger than the MSS are split into consecutive fragments,
    /// each sent only after the previous one is acknowledged.  There is no
    /// retry limit: the call only fails with [`ConnError::Closed`] once the
    /// receive loop has died, since no ACK can arrive after that.
    pub async fn send(&self, payload: &[u8], dest: SocketAddr) -> Result<(), ConnError> {
        let mut sender = self.sender.lock().await;
        if self.shared.is_closed() {
            return Err(ConnError::Closed);
        }

        if payload.len() > self.config.mss {
            log::debug!(
                "fragment {} byte(s) at mss {}",
                payload.len(),
                self.config.mss
            );
        }
        for fragment in fragments(payload, self.config.mss) {
            self.send_fragment(&mut sender, fragment, dest).await?;
        }
        Ok(())
    }

    /// Pop the next in-order payload, suspending at most once.
    ///
    /// Returns [`ConnError::WouldBlock`] when one wake-up (or the configured
    /// [`Config::receive_wait`]) passes without data.
    pub async fn receive_one(&self) -> Result<Vec<u8>, ConnError> {
        let shared = &self.shared;
        shared
            .queue
            .recv_one(self.config.receive_wait, || shared.is_closed())
            .await
    }

    /// Pop the next in-order payload without suspending.
    pub fn try_receive_one(&self) -> Result<Vec<u8>, ConnError> {
        match self.shared.queue.pop() {
            Some(payload) => Ok(payload),
            None if self.shared.is_closed() => Err(ConnError::Closed),
            None => Err(ConnError::WouldBlock),
        }
    }

    /// Wait for the receive loop to terminate and return the error that
    /// stopped it.
    pub async fn closed(mut self) -> Result<(), ConnError> {
        match self.receive_loop.take() {
            Some(handle) => handle.await.unwrap_or(Err(ConnError::Closed)),
            None => Err(ConnError::Closed),
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Last / min / max round-trip time in microseconds.
    pub fn rtt(&self) -> RttStats {
        self.shared
            .rtt
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .stats()
    }

    /// Sequence number the next accepted inbound PUSH must carry.
    pub fn expected_receive_sequence(&self) -> u32 {
        self.shared.expected.load(Ordering::Acquire)
    }

    /// Sequence number of the next outbound fragment.
    ///
    /// Waits for an in-progress `send` to finish.
    pub async fn next_send_sequence(&self) -> u32 {
        self.sender.lock().await.next_seq
    }

    /// Payloads accepted but not yet consumed.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Source address of the most recently accepted PUSH.
    pub fn last_peer(&self) -> Option<SocketAddr> {
        *self.shared.last_peer.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// `true` once the receive loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Settings this connection was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying datagram transport.
    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Send one fragment and wait for its acknowledgment.
    ///
    /// A fragment left in flight by a cancelled `send` is driven to
    /// acknowledgment first, so a new payload never reuses its sequence
    /// number.
    async fn send_fragment(
        &self,
        sender: &mut Sender,
        fragment: &[u8],
        dest: SocketAddr,
    ) -> Result<(), ConnError> {
        if sender.has_unacked() {
            log::debug!("resuming unacknowledged seq={}", sender.next_seq);
            self.drive_in_flight(sender, true).await?;
        }

        sender.record_sent(fragment, dest);
        self.drive_in_flight(sender, false).await
    }

    /// Transmit the in-flight segment and retransmit it every RTO until an
    /// ACK arrives.  `resumed` marks a segment that was already on the wire.
    async fn drive_in_flight(&self, sender: &mut Sender, resumed: bool) -> Result<(), ConnError> {
        let (seq, dest, bytes) = match &sender.unacked {
            Some(entry) => (entry.segment.seq, entry.dest, entry.bytes.clone()),
            None => return Ok(()),
        };

        let acked = self.shared.ack_signal.notified();
        tokio::pin!(acked);
        // Register before transmitting so an immediate ACK is not missed.
        acked.as_mut().enable();

        if resumed {
            sender.on_retransmit();
        }
        self.shared.transmit(&bytes, dest).await;
        log::debug!("→ PUSH seq={seq} len={} to {dest}", bytes.len() - HEADER_LEN);

        let retransmit = tokio::time::sleep(self.config.rto);
        tokio::pin!(retransmit);

        loop {
            tokio::select! {
                _ = &mut acked => {
                    if let Some(entry) = sender.on_ack() {
                        self.shared.record_rtt(entry.sent_at.elapsed());
                    }
                    log::debug!("← ACK seq={seq}");
                    return Ok(());
                }
                _ = &mut retransmit => {
                    if self.shared.is_closed() {
                        sender.abandon();
                        return Err(ConnError::Closed);
                    }
                    let attempt = sender.on_retransmit().map_or(0, |e| e.tx_count);
                    log::debug!("resend seq={seq} attempt={attempt}");
                    self.shared.transmit(&bytes, dest).await;
                    retransmit
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.config.rto);
                }
            }
        }
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.receive_loop.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Background receive loop
// ---------------------------------------------------------------------------

/// Read datagrams until the transport fails.
///
/// Framing errors are logged and skipped; a read error is returned and ends
/// the loop.
async fn receive_loop<T: Transport>(shared: &Shared<T>) -> Result<(), ConnError> {
    let mut receiver = Receiver::new();
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (n, from) = match shared.transport.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                log::error!("receive loop terminated: {e}");
                return Err(ConnError::Io(e));
            }
        };

        let segment = match Segment::decode(&buf[..n], Some(from)) {
            Ok(seg) => seg,
            Err(e) => {
                log::warn!("discarding datagram from {from}: {e}");
                continue;
            }
        };

        if segment.command == Command::Ack {
            log::debug!("← ACK from {from}");
            shared.ack_signal.notify_waiters();
            continue;
        }

        let seq = segment.seq;
        let verdict = receiver.on_push(seq);
        match verdict {
            Verdict::Ahead => {
                log::debug!("expected {}, got {seq}; dropped", receiver.expected());
            }
            Verdict::Duplicate => {
                log::debug!("← PUSH seq={seq} already delivered; re-acking");
            }
            Verdict::Accepted => {
                log::debug!("← PUSH seq={seq} len={} accepted", segment.payload.len());
                shared.queue.push(segment.payload);
                shared.expected.store(receiver.expected(), Ordering::Release);
                shared.set_last_peer(from);
            }
        }

        if verdict.needs_ack() {
            shared
                .transmit(&Segment::ack(Some(from)).encode(), from)
                .await;
        }
        if verdict == Verdict::Accepted {
            shared.queue.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::Socket;

    async fn endpoint() -> Connection<Socket> {
        let sock = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        Connection::new(sock, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let sock = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let res = Connection::new(sock, Config::default().with_mss(0));
        assert!(matches!(res, Err(ConnError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn single_payload_is_delivered_and_sequences_advance() {
        let a = endpoint().await;
        let b = endpoint().await;
        let b_addr = b.transport().local_addr;

        tokio::time::timeout(Duration::from_secs(5), a.send(b"A", b_addr))
            .await
            .expect("send timed out")
            .expect("send failed");

        let got = tokio::time::timeout(Duration::from_secs(5), b.receive_one())
            .await
            .expect("receive timed out")
            .expect("receive failed");
        assert_eq!(got, b"A");
        assert_eq!(a.next_send_sequence().await, 1);
        assert_eq!(b.expected_receive_sequence(), 1);
        assert_eq!(b.last_peer(), Some(a.transport().local_addr));

        let rtt = a.rtt();
        assert_eq!(rtt.samples, 1);
        assert_eq!(rtt.min_us, rtt.last_us);
        assert_eq!(rtt.max_us, rtt.last_us);
    }

    #[tokio::test]
    async fn try_receive_on_empty_queue_would_block() {
        let a = endpoint().await;
        assert!(matches!(a.try_receive_one(), Err(ConnError::WouldBlock)));
        assert!(!a.is_closed());
    }
}
