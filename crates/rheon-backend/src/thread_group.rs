//! In-process rank group: one thread per subdomain, channels between them.
//!
//! Each [`ThreadRank`] owns an inbox and a sender to every other rank.
//! Messages carry a tag (collective sequence number plus halo axis and
//! direction, or reduction) so a rank can receive them in any arrival
//! order; early arrivals wait in a pending buffer.
//!
//! Reductions gather every rank's value and fold them in rank order,
//! so every rank computes a bit-identical result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use rheon_grid::halo::{pack, unpack};
use rheon_grid::{Field, Side, SideKind, Subdomain};
use rheon_types::{RankId, RheonError, RheonResult};

use crate::comm::{Communicator, ReduceOp};

/// Default time a rank waits for a peer before reporting a failure.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Halo { seq: u64, axis: usize, toward: Side },
    Reduce { seq: u64 },
}

#[derive(Debug)]
struct Message {
    from: RankId,
    tag: Tag,
    data: Vec<f64>,
}

/// Builder for a group of connected in-process ranks.
pub struct ThreadGroup {
    parts: Vec<Subdomain>,
    timeout: Duration,
}

impl ThreadGroup {
    /// Creates a group from a full decomposition (one subdomain per rank, in rank order).
    pub fn new(parts: Vec<Subdomain>) -> Self {
        Self {
            parts,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets how long a rank waits for a peer message.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wires up channels and returns one communicator per rank.
    pub fn connect(self) -> RheonResult<Vec<ThreadRank>> {
        let size = self.parts.len();
        for (i, part) in self.parts.iter().enumerate() {
            if part.rank.index() != i || part.size() != size {
                return Err(RheonError::InvalidConfig(format!(
                    "Subdomain {} (rank {}, group of {}) does not belong to a {}-rank decomposition",
                    i,
                    part.rank.0,
                    part.size(),
                    size
                )));
            }
        }

        let (senders, inboxes): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
            (0..size).map(|_| mpsc::channel()).unzip();

        tracing::debug!(ranks = size, "Connected thread group");

        Ok(self
            .parts
            .into_iter()
            .zip(inboxes)
            .map(|(subdomain, inbox)| ThreadRank {
                subdomain,
                peers: senders.clone(),
                inbox: Mutex::new(inbox),
                pending: Mutex::new(Vec::new()),
                seq: AtomicU64::new(0),
                timeout: self.timeout,
            })
            .collect())
    }

    /// Runs `f` on one scoped thread per rank and returns the results in rank order.
    pub fn run<T, F>(self, f: F) -> RheonResult<Vec<T>>
    where
        T: Send,
        F: Fn(ThreadRank) -> RheonResult<T> + Sync,
    {
        let ranks = self.connect()?;
        std::thread::scope(|scope| {
            let f = &f;
            let handles: Vec<_> = ranks
                .into_iter()
                .map(|rank| scope.spawn(move || f(rank)))
                .collect();
            handles
                .into_iter()
                .map(|h| -> RheonResult<T> {
                    h.join()
                        .map_err(|_| RheonError::Communication("Rank thread panicked".into()))?
                })
                .collect()
        })
    }
}

/// One rank of a [`ThreadGroup`].
pub struct ThreadRank {
    subdomain: Subdomain,
    peers: Vec<Sender<Message>>,
    inbox: Mutex<Receiver<Message>>,
    pending: Mutex<Vec<Message>>,
    seq: AtomicU64,
    timeout: Duration,
}

fn poisoned<E>(_: E) -> RheonError {
    RheonError::Communication("Rank mailbox lock poisoned".into())
}

impl ThreadRank {
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, to: RankId, tag: Tag, data: Vec<f64>) -> RheonResult<()> {
        let peer = self.peers.get(to.index()).ok_or_else(|| {
            RheonError::Communication(format!("Rank {} does not exist", to.0))
        })?;
        peer.send(Message {
            from: self.subdomain.rank,
            tag,
            data,
        })
        .map_err(|_| RheonError::Communication(format!("Rank {} has hung up", to.0)))
    }

    fn receive(&self, from: RankId, tag: Tag) -> RheonResult<Vec<f64>> {
        {
            let mut pending = self.pending.lock().map_err(poisoned)?;
            if let Some(i) = pending.iter().position(|m| m.from == from && m.tag == tag) {
                return Ok(pending.swap_remove(i).data);
            }
        }
        let inbox = self.inbox.lock().map_err(poisoned)?;
        loop {
            let msg = inbox.recv_timeout(self.timeout).map_err(|e| {
                let what = match e {
                    RecvTimeoutError::Timeout => "timed out",
                    RecvTimeoutError::Disconnected => "lost its peers",
                };
                RheonError::Communication(format!(
                    "Rank {} {} waiting for {:?} from rank {}",
                    self.subdomain.rank.0, what, tag, from.0
                ))
            })?;
            if msg.from == from && msg.tag == tag {
                return Ok(msg.data);
            }
            self.pending.lock().map_err(poisoned)?.push(msg);
        }
    }
}

impl Communicator for ThreadRank {
    fn name(&self) -> &str {
        "thread_group"
    }

    fn subdomain(&self) -> &Subdomain {
        &self.subdomain
    }

    fn exchange(&self, field: &mut Field, axis: usize) -> RheonResult<()> {
        let seq = self.next_seq();
        for side in Side::BOTH {
            if let SideKind::Neighbor(peer) = self.subdomain.neighbor(axis, side) {
                let tag = Tag::Halo { seq, axis, toward: side };
                self.send(peer, tag, pack(field, axis, side))?;
            }
        }
        for side in Side::BOTH {
            if let SideKind::Neighbor(peer) = self.subdomain.neighbor(axis, side) {
                // The neighbour on our low side sent toward its high side.
                let tag = Tag::Halo {
                    seq,
                    axis,
                    toward: side.opposite(),
                };
                let data = self.receive(peer, tag)?;
                unpack(field, axis, side, &data)?;
            }
        }
        Ok(())
    }

    fn reduce(&self, value: f64, op: ReduceOp) -> RheonResult<f64> {
        let seq = self.next_seq();
        let me = self.subdomain.rank;
        let size = self.size();
        for r in 0..size {
            if r != me.index() {
                self.send(RankId(r as u32), Tag::Reduce { seq }, vec![value])?;
            }
        }
        let mut values = vec![0.0; size];
        for (r, slot) in values.iter_mut().enumerate() {
            *slot = if r == me.index() {
                value
            } else {
                let data = self.receive(RankId(r as u32), Tag::Reduce { seq })?;
                data.first().copied().ok_or_else(|| {
                    RheonError::Communication(format!("Empty reduction message from rank {}", r))
                })?
            };
        }
        Ok(op.fold(values))
    }
}
