//! Decouple producers from consumers with an elastic buffer.
//!
//! A [Pipe] pairs an inbound port and an outbound port with a pump task that owns a
//! [Ring](crate::ring::Ring). Both ports are rendezvous points: a send waits only until the pump
//! accepts the value, which it then pushes into the ring and offers to receivers one at a time in
//! the order values were accepted:
//!
//! ```text
//! send --> [inbound] --> pump --> Ring --> pump --> [outbound] --> recv
//! ```
//!
//! The pump only waits on the outbound port while the ring holds a value, so a slow (or absent)
//! receiver never stalls a sender. Outside the ring, the pipe holds at most one value in each port.
//! Memory is the only bound, unless the ring is configured with
//! [Mode::Cover](crate::ring::Mode::Cover).
//!
//! # Closing
//!
//! [Pipe::close] stops accepting new values. The pump then drains the ring into the outbound port
//! and exits, after which [Pipe::recv] and [Pipe::try_recv] return `None`.

mod metrics;
mod pump;

use crate::{
    ring::{Evict, Mode},
    Error,
};
use commonware_runtime::{Metrics, Spawner};
use futures::{channel::mpsc, future::poll_fn, lock::Mutex, StreamExt};
use prometheus_client::metrics::gauge::Gauge;
use pump::Pump;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Capacity used by [Config::default].
pub const DEFAULT_CAPACITY: usize = 5;

/// Configuration for a [Pipe].
pub struct Config<T> {
    /// Initial capacity of the ring.
    pub initial_capacity: usize,

    /// Policy applied when the ring is full.
    pub mode: Mode,

    /// Invoked with every value overwritten when `mode` is [Mode::Cover].
    pub on_evict: Option<Evict<T>>,
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            mode: Mode::default(),
            on_evict: None,
        }
    }
}

/// An unbounded, order-preserving channel backed by a [Ring](crate::ring::Ring).
pub struct Pipe<T> {
    inbound: Mutex<mpsc::Sender<T>>,
    closer: mpsc::Sender<T>,
    outbound: Mutex<mpsc::Receiver<T>>,
    closed: AtomicBool,
    buffered: Gauge,
    capacity: Gauge,
}

impl<T: Send + 'static> Pipe<T> {
    /// Create a new [Pipe] and spawn its pump task.
    pub fn new<E: Spawner + Metrics>(context: E, cfg: Config<T>) -> Self {
        let metrics = metrics::Metrics::init(context.clone());
        let (inbound, inbound_receiver) = mpsc::channel(0);
        let (outbound_sender, outbound) = mpsc::channel(0);

        let buffered = metrics.buffered.clone();
        let capacity = metrics.capacity.clone();
        let pump = Pump::new(cfg, inbound_receiver, outbound_sender, metrics);
        context.with_label("pump").spawn(|_| pump.run());

        Self {
            closer: inbound.clone(),
            inbound: Mutex::new(inbound),
            outbound: Mutex::new(outbound),
            closed: AtomicBool::new(false),
            buffered,
            capacity,
        }
    }

    /// Send a value into the pipe, waiting only until the pump accepts it.
    ///
    /// Concurrent senders are accepted one at a time. Returns [Error::Closed] if the pipe has been
    /// closed. Dropping the returned future before it completes drops the value.
    pub async fn send(&self, value: T) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        // The single sender has room for one value, which is free once the pump took the last one
        let mut inbound = self.inbound.lock().await;
        if poll_fn(|cx| inbound.poll_ready(cx)).await.is_err() {
            return Err(Error::Closed);
        }
        self.buffered.inc();
        if inbound.start_send(value).is_err() {
            self.buffered.dec();
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Receive the next value if one is immediately available.
    ///
    /// Returns `None` if no value is staged on the outbound port, another receiver is waiting, or
    /// the pipe has been closed and drained.
    pub fn try_recv(&self) -> Option<T> {
        let mut outbound = self.outbound.try_lock()?;
        let value = outbound.try_recv().ok()?;
        self.buffered.dec();
        Some(value)
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once the pipe has been closed and drained. Dropping the returned future
    /// before it completes does not lose a value.
    pub async fn recv(&self) -> Option<T> {
        let mut outbound = self.outbound.lock().await;
        let value = outbound.next().await?;
        self.buffered.dec();
        Some(value)
    }

    /// Stop accepting new values. Values already accepted remain available to receivers.
    ///
    /// Closing an already closed pipe does nothing.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.closer.clone().close_channel();
        debug!("closed pipe");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of values accepted but not yet received.
    ///
    /// This includes values the pump has not yet staged on the outbound port, which
    /// [Pipe::try_recv] cannot take yet.
    pub fn len(&self) -> usize {
        self.buffered.get().max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of the ring held by the pump.
    pub fn capacity(&self) -> usize {
        self.capacity.get().max(0) as usize
    }
}
