//! Deliver items at least once, redelivering any that are not acknowledged in time.
//!
//! [Queue] buffers items in a [Pipe](crate::pipe::Pipe). A consumer takes an item with
//! [Queue::get] (waiting) or [Queue::try_get] (non-waiting) and receives a [Delivery] carrying a
//! unique id. If the consumer asks for a deadline, the delivery is tracked until it is
//! acknowledged with [Queue::done]. A sweeper task periodically removes every tracked delivery
//! whose deadline has passed and hands it to the redelivery policy, which by default puts the
//! item back at the end of the queue.
//!
//! ```text
//!                       get (no deadline)
//!   put --> Waiting ----------------------> Delivered
//!              ^   \
//!              |    \ get (deadline)
//!              |     v
//!              |   InFlight ---- done ----> Acknowledged
//!              |     |
//!              +-----+ deadline passed (sweeper)
//! ```
//!
//! An acknowledgement that races with the sweeper is resolved by whichever removes the delivery
//! first: an item is redelivered at most once per expiry and a late [Queue::done] is ignored.
//!
//! # Example
//!
//! ```rust
//! use commonware_queue::{Config, Queue};
//! use commonware_runtime::{deterministic, Clock, Runner};
//! use std::time::Duration;
//!
//! let executor = deterministic::Runner::default();
//! executor.start(|context| async move {
//!     let queue = Queue::new(context.clone(), Config::default());
//!     queue.put("hello").await;
//!
//!     // Take the item, promising to acknowledge it within a second
//!     let deadline = context.current() + Duration::from_secs(1);
//!     let delivery = queue
//!         .get(futures::future::pending::<()>(), Some(deadline))
//!         .await
//!         .unwrap();
//!     assert_eq!(delivery.data, "hello");
//!
//!     // Acknowledge it
//!     queue.done(delivery.id);
//!     assert_eq!(queue.pending(), 0);
//! });
//! ```

mod metrics;
mod pending;
mod queue;

use crate::{
    pipe::DEFAULT_CAPACITY,
    ring::{Evict, Mode},
};
pub use queue::Queue;
use futures::future::BoxFuture;
use std::time::{Duration, SystemTime};

/// Interval used by [Config::default] between sweeps for expired deliveries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Policy invoked by the sweeper with each expired delivery: the queue, the delivery id, the item,
/// and the deadline that passed.
///
/// The sweeper awaits the returned future before handling the next expired delivery.
pub type DeadlineFn<T> =
    Box<dyn for<'a> Fn(&'a Queue<T>, u64, T, SystemTime) -> BoxFuture<'a, ()> + Send + Sync>;

/// An item taken from a [Queue].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery<T> {
    /// Unique (per queue) id of this delivery, used to acknowledge it.
    pub id: u64,

    /// The item.
    pub data: T,
}

/// Configuration for a [Queue].
pub struct Config<T> {
    /// Initial capacity of the buffer holding waiting items.
    pub initial_capacity: usize,

    /// Policy applied when the buffer is full.
    pub mode: Mode,

    /// Invoked with every item overwritten when `mode` is [Mode::Cover].
    pub on_evict: Option<Evict<T>>,

    /// How often to check for expired deliveries.
    pub sweep_interval: Duration,

    /// Policy for expired deliveries. If `None`, the item is put back into the queue.
    pub on_deadline: Option<DeadlineFn<T>>,
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            mode: Mode::default(),
            on_evict: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            on_deadline: None,
        }
    }
}
