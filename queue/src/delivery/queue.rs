use super::{metrics, pending::Pending, Config, DeadlineFn, Delivery};
use crate::pipe::{self, Pipe};
use commonware_macros::select;
use commonware_runtime::{Clock, Metrics, Spawner};
use futures::{
    channel::oneshot,
    future::{FutureExt, Shared},
};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::{Duration, SystemTime},
};
use tracing::{debug, trace};

struct Inner<T> {
    pipe: Pipe<T>,
    pending: Pending<T>,
    next_id: AtomicU64,
    on_deadline: Option<DeadlineFn<T>>,

    stopper: Mutex<Option<oneshot::Sender<()>>>,
    stopped: AtomicBool,
    signal: Shared<oneshot::Receiver<()>>,

    metrics: metrics::Metrics,
}

/// An at-least-once queue that redelivers items not acknowledged before their deadline.
///
/// Cloning a [Queue] returns another handle to the same queue.
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Queue<T> {
    /// Create a new [Queue], spawning its pump and sweeper tasks.
    pub fn new<E: Spawner + Clock + Metrics>(context: E, cfg: Config<T>) -> Self {
        let metrics = metrics::Metrics::init(context.clone());
        let pipe = Pipe::new(
            context.with_label("pipe"),
            pipe::Config {
                initial_capacity: cfg.initial_capacity,
                mode: cfg.mode,
                on_evict: cfg.on_evict,
            },
        );
        let (stopper, signal) = oneshot::channel();
        let inner = Arc::new(Inner {
            pipe,
            pending: Pending::new(),
            next_id: AtomicU64::new(0),
            on_deadline: cfg.on_deadline,
            stopper: Mutex::new(Some(stopper)),
            stopped: AtomicBool::new(false),
            signal: signal.shared(),
            metrics,
        });

        // The sweeper must not keep the queue alive
        let weak = Arc::downgrade(&inner);
        let signal = inner.signal.clone();
        let interval = cfg.sweep_interval;
        context
            .with_label("sweeper")
            .spawn(move |context| sweep(context, weak, signal, interval));

        Self { inner }
    }

    /// Add an item to the back of the queue.
    ///
    /// Waits only for the pump to accept the item, never on consumers. Items put after
    /// [Queue::close] or [Queue::stop] are dropped.
    pub async fn put(&self, data: T) {
        if let Err(err) = self.inner.pipe.send(data).await {
            debug!(?err, "dropping item");
            return;
        }
        self.inner.metrics.puts.inc();
    }

    /// Take the next item if one is immediately available.
    ///
    /// If `deadline` is provided, the item is redelivered unless [Queue::done] is called with the
    /// returned id before the deadline passes.
    pub fn try_get(&self, deadline: Option<SystemTime>) -> Option<Delivery<T>> {
        if self.is_stopped() {
            return None;
        }
        let data = self.inner.pipe.try_recv()?;
        Some(self.deliver(data, deadline))
    }

    /// Wait for the next item.
    ///
    /// Returns `None` if `cancel` resolves first, if the queue is stopped, or if the queue has
    /// been closed and drained. A cancelled call consumes no id and tracks nothing.
    ///
    /// If `deadline` is provided, the item is redelivered unless [Queue::done] is called with the
    /// returned id before the deadline passes.
    pub async fn get<C: Future>(
        &self,
        cancel: C,
        deadline: Option<SystemTime>,
    ) -> Option<Delivery<T>> {
        let signal = self.inner.signal.clone();
        let data = select! {
            _ = signal => {
                trace!("queue stopped");
                None
            },
            _ = cancel => {
                trace!("get cancelled");
                None
            },
            data = self.inner.pipe.recv() => {
                data
            },
        };
        Some(self.deliver(data?, deadline))
    }

    /// Acknowledge a delivery. Unknown or already expired ids are ignored.
    pub fn done(&self, id: u64) {
        if self.inner.pending.remove(id).is_none() {
            trace!(id, "ignoring stale acknowledgement");
            return;
        }
        self.inner.metrics.pending.dec();
        self.inner.metrics.acknowledgements.inc();
    }

    /// Acknowledge every outstanding delivery.
    pub fn done_all(&self) {
        let removed = self.inner.pending.clear();
        self.inner.metrics.pending.dec_by(removed as i64);
        self.inner.metrics.acknowledgements.inc_by(removed as u64);
        debug!(removed, "acknowledged all deliveries");
    }

    /// Stop accepting new items. Items already put can still be taken.
    ///
    /// Closing an already closed queue does nothing.
    pub fn close(&self) {
        self.inner.pipe.close();
    }

    /// Stop the queue: wake all waiting consumers, stop redelivering expired items, and close
    /// the queue.
    ///
    /// Once stopped, [Queue::get] and [Queue::try_get] always return `None`.
    pub fn stop(&self) {
        let Some(stopper) = self.inner.stopper.lock().unwrap().take() else {
            return;
        };
        self.inner.stopped.store(true, Ordering::Release);
        let _ = stopper.send(());
        self.inner.pipe.close();
        debug!("stopped queue");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.pipe.is_closed()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Number of items waiting to be taken.
    ///
    /// An item is counted as soon as [Queue::put] returns, which can be before the pump has
    /// staged it for [Queue::try_get].
    pub fn len(&self) -> usize {
        self.inner.pipe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of deliveries awaiting acknowledgement.
    pub fn pending(&self) -> usize {
        self.inner.pending.len()
    }

    /// Returns whether the delivery `id` is awaiting acknowledgement.
    pub fn is_pending(&self, id: u64) -> bool {
        self.inner.pending.contains(id)
    }

    /// Assign an id to `data` and track it if a deadline was requested.
    fn deliver(&self, data: T, deadline: Option<SystemTime>) -> Delivery<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(deadline) = deadline {
            // Count the entry before it can be acknowledged
            self.inner.metrics.pending.inc();
            self.inner.pending.insert(id, data.clone(), deadline);
        }
        self.inner.metrics.deliveries.inc();
        trace!(id, tracked = deadline.is_some(), "delivered item");
        Delivery { id, data }
    }

    /// Remove every delivery whose deadline is at or before `now` and hand it to the
    /// redelivery policy.
    async fn expire(&self, now: SystemTime) {
        let expired = self.inner.pending.expire(now);
        if expired.is_empty() {
            return;
        }
        self.inner.metrics.pending.dec_by(expired.len() as i64);
        for (id, entry) in expired {
            self.inner.metrics.expirations.inc();
            debug!(id, deadline = ?entry.deadline, "delivery expired");
            match &self.inner.on_deadline {
                Some(on_deadline) => on_deadline(self, id, entry.data, entry.deadline).await,
                None => self.put(entry.data).await,
            }
        }
    }
}

/// Periodically expire deliveries until the queue is stopped or dropped.
async fn sweep<E: Clock, T: Clone + Send + 'static>(
    context: E,
    inner: Weak<Inner<T>>,
    mut signal: Shared<oneshot::Receiver<()>>,
    interval: Duration,
) {
    loop {
        select! {
            _ = &mut signal => {
                debug!("sweeper exiting");
                return;
            },
            _ = context.sleep(interval) => {},
        };
        let Some(inner) = inner.upgrade() else {
            debug!("queue dropped, sweeper exiting");
            return;
        };
        Queue { inner }.expire(context.current()).await;
    }
}
