//! Event fan-out with scoped subscriptions
//!
//! An [`EventBus`] delivers protocol events to every live subscription whose
//! filter matches. A subscription is released when its handle is dropped.
//! Closing the bus ends every stream, which is how a lost inspector surfaces
//! to listeners.

use cdp_types::CdpEvent;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, trace};

struct Subscriber {
    id: u64,
    events: Vec<String>,
    tx: mpsc::UnboundedSender<CdpEvent>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl BusInner {
    fn remove(&self, id: u64) {
        self.subscribers.lock().retain(|s| s.id != id);
    }
}

/// Owner of the subscriber list
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new, open bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle used by event producers
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to the given event names
    ///
    /// On a closed bus the returned subscription is already finished.
    pub fn subscribe(&self, events: &[&str]) -> EventSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);

        if self.inner.closed.load(Ordering::SeqCst) {
            drop(tx);
        } else {
            self.inner.subscribers.lock().push(Subscriber {
                id,
                events: events.iter().map(|e| e.to_string()).collect(),
                tx,
            });
            debug!("Subscription {} registered for {:?}", id, events);
        }

        EventSubscription {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Close the bus, ending every live subscription
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let dropped = std::mem::take(&mut *self.inner.subscribers.lock());
        debug!("Event bus closed, ending {} subscriptions", dropped.len());
    }

    /// Whether the bus has been closed
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

/// Producer side of an [`EventBus`]
#[derive(Clone)]
pub struct EventEmitter {
    inner: Weak<BusInner>,
}

impl EventEmitter {
    /// Deliver an event to every matching subscription
    ///
    /// Returns the number of subscriptions the event reached.
    pub fn emit(&self, event: CdpEvent) -> usize {
        let Some(inner) = self.inner.upgrade() else {
            return 0;
        };

        let subscribers = inner.subscribers.lock();
        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            if subscriber.events.iter().any(|e| *e == event.method)
                && subscriber.tx.send(event.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        trace!("Event {} delivered to {} subscriptions", event.method, delivered);
        delivered
    }
}

/// A live subscription; dropping it unsubscribes
pub struct EventSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<CdpEvent>,
    bus: Weak<BusInner>,
}

impl EventSubscription {
    /// Receive the next event
    ///
    /// Returns `None` once the bus is closed or dropped and all pending
    /// events have been drained.
    pub async fn recv(&mut self) -> Option<CdpEvent> {
        self.rx.recv().await
    }

    /// Release the subscription
    pub fn unsubscribe(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
            debug!("Subscription {} released", self.id);
        }
    }
}
