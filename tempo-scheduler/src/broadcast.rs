/// Broadcast fan-out to connected viewers
///
/// The [`Broadcaster`] is the delivery channel for notification events: a
/// registry of long-lived viewer connections, each backed by an unbounded
/// channel. A broadcast walks a snapshot of the registry taken under the
/// lock, so viewers registering or deregistering mid-broadcast never corrupt
/// the iteration, and a dead viewer never blocks delivery to the others.
///
/// There is no buffering or replay: a viewer connecting after an event was
/// broadcast will not receive it.
///
/// # Example
///
/// ```
/// use tempo_scheduler::broadcast::Broadcaster;
/// use tempo_shared::events::NotificationEvent;
///
/// let broadcaster = Broadcaster::new();
/// let viewer = broadcaster.register();
///
/// let delivered = broadcaster.broadcast(&NotificationEvent::connected());
/// assert_eq!(delivered, 1);
/// ```

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tempo_shared::events::NotificationEvent;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

type ViewerRegistry = Mutex<HashMap<Uuid, mpsc::UnboundedSender<NotificationEvent>>>;

/// Process-wide fan-out of notification events to connected viewers
#[derive(Default)]
pub struct Broadcaster {
    viewers: Arc<ViewerRegistry>,
}

impl Broadcaster {
    /// Creates an empty broadcaster
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new viewer connection
    ///
    /// The returned [`Viewer`] is a stream of events; dropping it (or calling
    /// [`Broadcaster::deregister`] with its id) removes the registration.
    pub fn register(&self) -> Viewer {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.viewers
            .lock()
            .expect("viewer registry poisoned")
            .insert(id, tx);

        debug!(viewer_id = %id, "Viewer registered");

        Viewer {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.viewers),
        }
    }

    /// Removes a viewer registration
    ///
    /// Idempotent: removing an unknown or already-removed id is a no-op.
    pub fn deregister(&self, id: Uuid) {
        let removed = self
            .viewers
            .lock()
            .expect("viewer registry poisoned")
            .remove(&id)
            .is_some();

        if removed {
            debug!(viewer_id = %id, "Viewer deregistered");
        }
    }

    /// Sends an event to every currently registered viewer
    ///
    /// Iterates over a snapshot of the registry, so concurrent registration
    /// or deregistration cannot disturb an in-progress broadcast. Viewers
    /// whose channel has closed are pruned. Returns the number of viewers
    /// the event was delivered to; broadcasting to zero viewers is a no-op.
    pub fn broadcast(&self, event: &NotificationEvent) -> usize {
        let snapshot: Vec<(Uuid, mpsc::UnboundedSender<NotificationEvent>)> = {
            let viewers = self.viewers.lock().expect("viewer registry poisoned");
            viewers.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        if snapshot.is_empty() {
            trace!("Broadcast with no viewers connected");
            return 0;
        }

        let mut delivered = 0;
        let mut dead = Vec::new();

        for (id, tx) in snapshot {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut viewers = self.viewers.lock().expect("viewer registry poisoned");
            for id in dead {
                viewers.remove(&id);
                debug!(viewer_id = %id, "Pruned closed viewer");
            }
        }

        delivered
    }

    /// Number of currently registered viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.lock().expect("viewer registry poisoned").len()
    }
}

/// A registered viewer connection
///
/// Yields every event broadcast after registration, in emission order.
/// Dropping the viewer deregisters it.
pub struct Viewer {
    id: Uuid,
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
    registry: Weak<ViewerRegistry>,
}

impl Viewer {
    /// The registry id of this connection
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receives the next broadcast event
    ///
    /// Returns None once the viewer has been deregistered and the channel
    /// drained.
    pub async fn recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.recv().await
    }

    /// Receives the next event without waiting
    pub fn try_recv(&mut self) -> Option<NotificationEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Viewer {
    type Item = NotificationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .expect("viewer registry poisoned")
                .remove(&self.id);
            debug!(viewer_id = %self.id, "Viewer deregistered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> NotificationEvent {
        NotificationEvent::connected()
    }

    #[tokio::test]
    async fn test_broadcast_with_no_viewers_is_noop() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.broadcast(&connected()), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_viewers() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.register();
        let mut b = broadcaster.register();

        assert_eq!(broadcaster.broadcast(&connected()), 2);

        assert_eq!(a.recv().await, Some(connected()));
        assert_eq!(b.recv().await, Some(connected()));
    }

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let broadcaster = Broadcaster::new();
        let mut viewer = broadcaster.register();

        for _ in 0..3 {
            broadcaster.broadcast(&connected());
        }

        let mut seen = 0;
        while viewer.try_recv().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let broadcaster = Broadcaster::new();
        let viewer = broadcaster.register();
        let id = viewer.id();

        broadcaster.deregister(id);
        broadcaster.deregister(id);
        assert_eq!(broadcaster.viewer_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_deregisters_viewer() {
        let broadcaster = Broadcaster::new();
        let viewer = broadcaster.register();
        assert_eq!(broadcaster.viewer_count(), 1);

        drop(viewer);
        assert_eq!(broadcaster.viewer_count(), 0);
    }

    #[tokio::test]
    async fn test_dead_viewer_does_not_block_others() {
        let broadcaster = Broadcaster::new();

        // A viewer whose receiving half closed without deregistering
        let mut dead = broadcaster.register();
        dead.receiver.close();

        let mut alive = broadcaster.register();
        assert_eq!(broadcaster.viewer_count(), 2);

        // Delivery reaches the live viewer and prunes the dead one
        assert_eq!(broadcaster.broadcast(&connected()), 1);
        assert_eq!(broadcaster.viewer_count(), 1);
        assert_eq!(alive.recv().await, Some(connected()));
    }

    #[tokio::test]
    async fn test_late_viewer_misses_earlier_events() {
        let broadcaster = Broadcaster::new();
        broadcaster.broadcast(&connected());

        let mut late = broadcaster.register();
        assert_eq!(late.try_recv(), None);
    }
}
