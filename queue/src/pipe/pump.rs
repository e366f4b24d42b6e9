use super::{metrics, Config};
use crate::ring::Ring;
use futures::{channel::mpsc, future::poll_fn, StreamExt};
use std::task::Poll;
use tracing::{debug, trace};

/// Outcome of a single wait in the pump loop.
enum Event<T> {
    /// A value (or the end of input) arrived on the inbound port.
    Inbound(Option<T>),
    /// The outbound port can accept the head of the ring.
    Ready,
    /// Every receiver of the outbound port is gone.
    Dropped,
}

/// Task that moves values from the inbound port, through a [Ring], to the outbound port.
pub(super) struct Pump<T> {
    ring: Ring<T>,
    inbound: mpsc::Receiver<T>,
    outbound: mpsc::Sender<T>,
    metrics: metrics::Metrics,
}

impl<T: Send + 'static> Pump<T> {
    pub(super) fn new(
        cfg: Config<T>,
        inbound: mpsc::Receiver<T>,
        outbound: mpsc::Sender<T>,
        metrics: metrics::Metrics,
    ) -> Self {
        let mut ring = Ring::new(cfg.initial_capacity, cfg.mode);
        let mut on_evict = cfg.on_evict;
        let buffered = metrics.buffered.clone();
        let evicted = metrics.evicted.clone();
        ring.set_evict(Box::new(move |value| {
            buffered.dec();
            evicted.inc();
            if let Some(on_evict) = on_evict.as_mut() {
                on_evict(value);
            }
        }));
        metrics.capacity.set(ring.capacity() as i64);

        Self {
            ring,
            inbound,
            outbound,
            metrics,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            // Only offer the head of the ring when there is one, so accepting
            // inbound values never waits on the outbound port
            let has_head = !self.ring.is_empty();
            let event = poll_fn(|cx| {
                if has_head {
                    match self.outbound.poll_ready(cx) {
                        Poll::Ready(Ok(())) => return Poll::Ready(Event::Ready),
                        Poll::Ready(Err(_)) => return Poll::Ready(Event::Dropped),
                        Poll::Pending => {}
                    }
                }
                self.inbound.poll_next_unpin(cx).map(Event::Inbound)
            })
            .await;

            match event {
                Event::Inbound(Some(value)) => {
                    self.ring.push(value);
                    self.metrics.capacity.set(self.ring.capacity() as i64);
                    trace!(len = self.ring.len(), "buffered value");
                }
                Event::Inbound(None) => {
                    debug!(remaining = self.ring.len(), "inbound closed, draining");
                    self.drain().await;
                    break;
                }
                Event::Ready => {
                    let Some(value) = self.ring.pull() else {
                        continue;
                    };
                    if self.outbound.start_send(value).is_err() {
                        debug!("outbound dropped");
                        break;
                    }
                }
                Event::Dropped => {
                    debug!(remaining = self.ring.len(), "outbound dropped");
                    break;
                }
            }
        }
        debug!("pump exited");
    }

    /// Hand every remaining value to the outbound port.
    async fn drain(&mut self) {
        while !self.ring.is_empty() {
            if poll_fn(|cx| self.outbound.poll_ready(cx)).await.is_err() {
                debug!(remaining = self.ring.len(), "outbound dropped while draining");
                return;
            }
            let Some(value) = self.ring.pull() else {
                return;
            };
            if self.outbound.start_send(value).is_err() {
                return;
            }
        }
    }
}
