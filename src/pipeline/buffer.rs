//! Bounded single-producer/single-consumer buffer link.
//!
//! A link is the storage behind one edge of the map. It is built from three
//! crossbeam channels:
//!
//! ```text
//!            credits (bounded, capacity)
//!   LinkTx ──────────────────────────────► LinkRx
//!          ── data (unbounded, FIFO) ─────►
//!          ◄─ pool (recycled storage) ─────
//! ```
//!
//! A credit is taken before every send and handed back on recycle, so the
//! number of in-flight buffers (queued plus peeked-but-not-recycled) never
//! exceeds the capacity. Dropping the `LinkTx` ends the stream: the consumer
//! drains what is queued and then sees end-of-stream. Dropping the `LinkRx`
//! wakes a blocked producer with [`LinkClosed`].

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Anything that can travel through a port.
///
/// `Default` provides fresh storage when the recycle pool is empty.
pub trait Payload: Default + Send + 'static {}

impl<T: Default + Send + 'static> Payload for T {}

/// Largest capacity a link accepts. Both bounded channels allocate every
/// slot up front.
pub const MAX_LINK_CAPACITY: usize = 1 << 16;

/// Per-link traffic counters, shared between both halves and the map.
#[derive(Debug, Default)]
pub struct LinkCounters {
    sent: AtomicU64,
    recycled: AtomicU64,
}

impl LinkCounters {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn recycled(&self) -> u64 {
        self.recycled.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LinkTraffic {
        LinkTraffic {
            sent: self.sent(),
            recycled: self.recycled(),
        }
    }
}

/// Point-in-time copy of [`LinkCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkTraffic {
    pub sent: u64,
    pub recycled: u64,
}

/// The consumer side has gone away; the value that could not be delivered
/// is handed back.
#[derive(Debug)]
pub struct LinkClosed<T>(pub T);

/// Outcome of a non-blocking send.
#[derive(Debug)]
pub enum TrySend<T> {
    Sent,
    /// The link is at capacity; the value is handed back.
    Full(T),
}

/// Create a link with room for `capacity` in-flight buffers.
///
/// `capacity` must be in `1..=MAX_LINK_CAPACITY`; the map rejects anything
/// else before calling this.
pub fn bounded_link<T: Payload>(
    capacity: usize,
    counters: Arc<LinkCounters>,
) -> (LinkTx<T>, LinkRx<T>) {
    debug_assert!((1..=MAX_LINK_CAPACITY).contains(&capacity));
    let (credit_tx, credit_rx) = bounded(capacity);
    let (data_tx, data_rx) = unbounded();
    let (pool_tx, pool_rx) = bounded(capacity);

    let tx = LinkTx {
        data: data_tx,
        credits: credit_tx,
        pool: pool_rx,
        spare: None,
        counters: counters.clone(),
    };
    let rx = LinkRx {
        data: data_rx,
        credits: credit_rx,
        pool: pool_tx,
        head: None,
        counters,
    };
    (tx, rx)
}

/// Producer half of a link.
pub struct LinkTx<T> {
    data: Sender<T>,
    credits: Sender<()>,
    pool: Receiver<T>,
    /// Storage from an allocation that was abandoned before send.
    spare: Option<T>,
    counters: Arc<LinkCounters>,
}

impl<T: Payload> LinkTx<T> {
    /// Storage for the next buffer: an abandoned allocation, then recycled
    /// storage from the consumer, then a fresh default value.
    pub fn take_storage(&mut self) -> T {
        if let Some(spare) = self.spare.take() {
            return spare;
        }
        self.pool.try_recv().unwrap_or_default()
    }

    /// Keep storage from an allocation that will not be sent.
    pub fn return_storage(&mut self, value: T) {
        self.spare = Some(value);
    }

    /// Publish a buffer, blocking while the link is at capacity.
    pub fn send(&self, value: T) -> Result<(), LinkClosed<T>> {
        if self.credits.send(()).is_err() {
            return Err(LinkClosed(value));
        }
        self.data.send(value).map_err(|e| LinkClosed(e.into_inner()))?;
        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Publish a buffer only if the link has room right now.
    pub fn try_send(&self, value: T) -> Result<TrySend<T>, LinkClosed<T>> {
        match self.credits.try_send(()) {
            Ok(()) => {}
            Err(TrySendError::Full(())) => return Ok(TrySend::Full(value)),
            Err(TrySendError::Disconnected(())) => return Err(LinkClosed(value)),
        }
        self.data.send(value).map_err(|e| LinkClosed(e.into_inner()))?;
        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        Ok(TrySend::Sent)
    }

    /// Buffers sent but not yet recycled.
    pub fn in_flight(&self) -> usize {
        self.credits.len()
    }

    pub fn capacity(&self) -> usize {
        self.credits.capacity().unwrap_or(usize::MAX)
    }
}

/// Consumer half of a link.
pub struct LinkRx<T> {
    data: Receiver<T>,
    credits: Receiver<()>,
    pool: Sender<T>,
    /// Oldest undelivered buffer, loaded by `peek` and cleared by `recycle`.
    head: Option<T>,
    counters: Arc<LinkCounters>,
}

impl<T: Payload> LinkRx<T> {
    /// Borrow the oldest buffer without consuming it, blocking until one
    /// arrives. `None` once the producer has gone and the queue is drained.
    pub fn peek(&mut self) -> Option<&mut T> {
        if self.head.is_none() {
            self.head = Some(self.data.recv().ok()?);
        }
        self.head.as_mut()
    }

    /// Non-blocking peek. `Ok(None)` means nothing is queued yet; `Err(())`
    /// means the stream has ended.
    #[allow(clippy::result_unit_err)]
    pub fn try_peek(&mut self) -> Result<Option<&mut T>, ()> {
        if self.head.is_none() {
            match self.data.try_recv() {
                Ok(value) => self.head = Some(value),
                Err(crossbeam_channel::TryRecvError::Empty) => return Ok(None),
                Err(crossbeam_channel::TryRecvError::Disconnected) => return Err(()),
            }
        }
        Ok(self.head.as_mut())
    }

    /// Whether a peeked buffer is waiting to be recycled.
    pub fn has_head(&self) -> bool {
        self.head.is_some()
    }

    /// Move the peeked buffer out of the link while it stays counted as in
    /// flight. The caller must hand it back through [`LinkRx::release`].
    pub fn take_head(&mut self) -> Option<T> {
        self.head.take()
    }

    /// Recycle the peeked buffer. Returns false if nothing was peeked.
    pub fn recycle(&mut self) -> bool {
        match self.head.take() {
            Some(value) => {
                self.release(value);
                true
            }
            None => false,
        }
    }

    /// Give one in-flight buffer's capacity back to the producer and offer
    /// its storage for reuse.
    pub fn release(&mut self, value: T) {
        // The producer takes its credit before enqueuing, so one is always
        // present for a delivered buffer.
        let _ = self.credits.try_recv();
        // A full pool or a finished producer just means the storage is dropped.
        let _ = self.pool.try_send(value);
        self.counters.recycled.fetch_add(1, Ordering::Relaxed);
    }

    /// Buffers queued behind the head, not counting a peeked one.
    pub fn queued(&self) -> usize {
        self.data.len()
    }
}
