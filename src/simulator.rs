//! Fault-injecting network layer for deterministic testing.
//!
//! Real networks drop and duplicate packets.  To exercise the reliability
//! mechanisms without depending on actual network conditions, this module
//! provides a [`Simulator`] that wraps any [`Transport`] and intercepts
//! outbound datagrams, applying a configurable fault model:
//!
//! | Fault            | Description                                          |
//! |------------------|------------------------------------------------------|
//! | Scripted drop    | Drop the outbound datagrams at the listed indices.   |
//! | Packet loss      | Drop a datagram with probability `loss_rate`.        |
//! | Duplication      | Deliver a datagram twice (`duplicate_rate`).         |
//!
//! Random faults draw from a seeded RNG so failing runs are reproducible.
//! Inbound datagrams pass through untouched.

use std::collections::BTreeSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::socket::Transport;

/// Configuration for the fault-injection model.
///
/// Probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram is sent twice.
    pub duplicate_rate: f64,
    /// 0-based indices of outbound datagrams that are always dropped.
    pub drop_indices: BTreeSet<usize>,
    /// RNG seed for the random faults.
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            duplicate_rate: 0.0,
            drop_indices: BTreeSet::new(),
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Drop exactly the outbound datagrams at `indices`, nothing else.
    pub fn dropping(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            drop_indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// What happens to one outbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Drop,
    Deliver,
    Duplicate,
}

#[derive(Debug)]
struct FaultState {
    rng: StdRng,
    next_index: usize,
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    state: Mutex<FaultState>,
    sent: AtomicUsize,
    dropped: AtomicUsize,
    duplicated: AtomicUsize,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            state: Mutex::new(FaultState { rng, next_index: 0 }),
            sent: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            duplicated: AtomicUsize::new(0),
        }
    }

    /// Datagrams handed to the simulator for sending.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn duplicated(&self) -> usize {
        self.duplicated.load(Ordering::Relaxed)
    }

    fn decide(&self) -> Fate {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let index = state.next_index;
        state.next_index += 1;
        self.sent.fetch_add(1, Ordering::Relaxed);

        let fate = if self.config.drop_indices.contains(&index)
            || state.rng.gen_bool(self.config.loss_rate.clamp(0.0, 1.0))
        {
            Fate::Drop
        } else if state.rng.gen_bool(self.config.duplicate_rate.clamp(0.0, 1.0)) {
            Fate::Duplicate
        } else {
            Fate::Deliver
        };

        match fate {
            Fate::Drop => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("[sim] drop datagram #{index}");
            }
            Fate::Duplicate => {
                self.duplicated.fetch_add(1, Ordering::Relaxed);
                log::debug!("[sim] duplicate datagram #{index}");
            }
            Fate::Deliver => {}
        }
        fate
    }
}

impl<T: Transport> Transport for Simulator<T> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        match self.decide() {
            // A dropped datagram looks sent to the caller.
            Fate::Drop => Ok(buf.len()),
            Fate::Deliver => self.inner.send_to(buf, dest).await,
            Fate::Duplicate => {
                self.inner.send_to(buf, dest).await?;
                self.inner.send_to(buf, dest).await
            }
        }
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        match self.decide() {
            Fate::Drop => Ok(buf.len()),
            Fate::Deliver => self.inner.send(buf).await,
            Fate::Duplicate => {
                self.inner.send(buf).await?;
                self.inner.send(buf).await
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr()
    }
}
