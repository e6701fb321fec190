//! Deferred delivery of results to caller-supplied callbacks.
//!
//! A callback is never run inline with the operation that produced its result. The
//! dispatcher hands each result to [`DeferredCallback::deliver`], which enqueues it on a
//! single-consumer work queue. The host drains that queue on a later turn of its loop
//! through a [`CallbackLoop`], either by spawning [`CallbackLoop::run`] or by calling
//! [`CallbackLoop::run_pending`] from its own tick.
//!
//! # Example
//!
//! ```ignore
//! let (deferred, callbacks) = DeferredCallback::channel();
//! tokio::spawn(callbacks.run());
//!
//! deferred.deliver(callback(|envelope| println!("{envelope:?}")), envelope);
//! ```

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{error, warn};

use crate::envelope::ResultEnvelope;

/// A caller continuation. `FnOnce` guarantees it runs at most once.
pub type Callback = Box<dyn FnOnce(ResultEnvelope) + Send + 'static>;

/// Boxes a closure into an optional [`Callback`].
pub fn callback<F>(f: F) -> Option<Callback>
where
    F: FnOnce(ResultEnvelope) + Send + 'static,
{
    Some(Box::new(f))
}

/// Identifies a scheduled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryHandle(u64);

impl DeliveryHandle {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

struct Delivery {
    handle: DeliveryHandle,
    callback: Callback,
    envelope: ResultEnvelope,
}

impl Delivery {
    fn invoke(self) {
        let Delivery { handle, callback, envelope } = self;

        if catch_unwind(AssertUnwindSafe(move || callback(envelope))).is_err() {
            error!(
                target: "docbridge::callback",
                sequence = handle.0,
                "Callback panicked"
            );
        }
    }
}

/// Producer side of the callback queue.
#[derive(Clone)]
pub struct DeferredCallback {
    sender: UnboundedSender<Delivery>,
    sequence: Arc<AtomicU64>,
}

impl DeferredCallback {
    /// Creates a connected producer and loop pair.
    pub fn channel() -> (DeferredCallback, CallbackLoop) {
        let (sender, receiver) = unbounded_channel();

        (
            DeferredCallback {
                sender,
                sequence: Arc::new(AtomicU64::new(0)),
            },
            CallbackLoop { receiver },
        )
    }

    /// Schedules `callback(envelope)` for a later turn of the callback loop.
    ///
    /// Returns `None` without doing anything when there is no callback. Also returns
    /// `None` when the loop has been dropped, in which case the result is discarded.
    pub fn deliver(&self, callback: Option<Callback>, envelope: ResultEnvelope) -> Option<DeliveryHandle> {
        let callback = callback?;
        let handle = DeliveryHandle(self.sequence.fetch_add(1, Ordering::Relaxed));

        match self.sender.send(Delivery { handle, callback, envelope }) {
            Ok(()) => Some(handle),
            Err(_) => {
                warn!(
                    target: "docbridge::callback",
                    sequence = handle.0,
                    "Callback loop is gone, dropping result"
                );
                None
            }
        }
    }
}

impl fmt::Debug for DeferredCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredCallback")
            .field("scheduled", &self.sequence.load(Ordering::Relaxed))
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Consumer side of the callback queue.
pub struct CallbackLoop {
    receiver: UnboundedReceiver<Delivery>,
}

impl CallbackLoop {
    /// Runs callbacks as they arrive until every [`DeferredCallback`] is dropped.
    pub async fn run(mut self) {
        while let Some(delivery) = self.receiver.recv().await {
            delivery.invoke();
        }
    }

    /// Runs every callback queued so far and returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;

        while let Ok(delivery) = self.receiver.try_recv() {
            delivery.invoke();
            ran += 1;
        }

        ran
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl fmt::Debug for CallbackLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackLoop")
            .field("pending", &self.pending())
            .finish()
    }
}
