//! src/eventbus/mod.rs
//!
//! Fans overlay snapshots out to every subscriber through bounded MPSC queues.
//!
//! Publishing never waits: snapshots are pushed from inside the pipeline's
//! critical section, so a subscriber whose queue is full or closed is dropped
//! instead of stalling everyone else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use chatplays_common::models::OverlaySnapshot;

pub type ListenerId = u64;

/// Default size for each subscriber’s buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 64;

struct Listener {
    id: ListenerId,
    tx: mpsc::Sender<Arc<OverlaySnapshot>>,
}

pub struct OverlayBroadcaster {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

impl OverlayBroadcaster {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the listener id and the receiver snapshots will arrive on.
    pub fn subscribe(&self, buffer_size: Option<usize>) -> (ListenerId, mpsc::Receiver<Arc<OverlaySnapshot>>) {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1);
        let (tx, rx) = mpsc::channel(size);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Listener { id, tx });
        debug!("overlay listener {} subscribed", id);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    /// Pushes one snapshot to everyone. Listeners that can't take it are
    /// removed. Returns how many listeners received it.
    pub fn publish(&self, snapshot: OverlaySnapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| match listener.tx.try_send(Arc::clone(&snapshot)) {
            Ok(()) => true,
            Err(e) => {
                debug!("dropping overlay listener {}: {}", listener.id, e);
                false
            }
        });
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl Default for OverlayBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
