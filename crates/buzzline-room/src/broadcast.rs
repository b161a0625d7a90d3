//! Fan-out of server events to a room's subscribed connections.

use std::collections::BTreeMap;
use std::sync::Arc;

use buzzline_protocol::{ConnectionId, RoomCode, ServerEvent};
use tokio::sync::mpsc;

/// Outbound channel of one connection. Events are shared, not cloned,
/// across recipients.
pub type ConnectionSender = mpsc::UnboundedSender<Arc<ServerEvent>>;

/// Who an event is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Room,
    Connection(ConnectionId),
    RoomExcept(ConnectionId),
}

/// The subscriber set of one room.
///
/// Delivery is best effort: a closed receiver means the connection is
/// going away and its cleanup will unsubscribe it.
#[derive(Debug)]
pub struct Broadcaster {
    code: RoomCode,
    subscribers: BTreeMap<ConnectionId, ConnectionSender>,
}

impl Broadcaster {
    pub fn new(code: RoomCode) -> Self {
        Self { code, subscribers: BTreeMap::new() }
    }

    /// Adds or replaces the sender for `connection_id`.
    pub fn subscribe(&mut self, connection_id: ConnectionId, sender: ConnectionSender) {
        self.subscribers.insert(connection_id, sender);
    }

    pub fn unsubscribe(&mut self, connection_id: ConnectionId) -> bool {
        self.subscribers.remove(&connection_id).is_some()
    }

    pub fn is_subscribed(&self, connection_id: ConnectionId) -> bool {
        self.subscribers.contains_key(&connection_id)
    }

    pub fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        let event = Arc::new(event);
        match recipient {
            Recipient::Room => {
                for sender in self.subscribers.values() {
                    let _ = sender.send(Arc::clone(&event));
                }
            }
            Recipient::Connection(id) => {
                if let Some(sender) = self.subscribers.get(&id) {
                    let _ = sender.send(event);
                }
            }
            Recipient::RoomExcept(excluded) => {
                for (id, sender) in &self.subscribers {
                    if *id != excluded {
                        let _ = sender.send(Arc::clone(&event));
                    }
                }
            }
        }
        tracing::trace!(room = %self.code, ?recipient, "event dispatched");
    }

    pub fn publish(&self, event: ServerEvent) {
        self.dispatch(Recipient::Room, event);
    }

    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        self.dispatch(Recipient::Connection(connection_id), event);
    }

    pub fn publish_except(&self, excluded: ConnectionId, event: ServerEvent) {
        self.dispatch(Recipient::RoomExcept(excluded), event);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buzzline_protocol::PlayerId;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(RoomCode::parse("ABCDE").unwrap())
    }

    fn left(id: u64) -> ServerEvent {
        ServerEvent::PlayerLeft { player_id: PlayerId(id) }
    }

    #[test]
    fn test_publish_reaches_everyone() {
        let mut b = broadcaster();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        b.subscribe(ConnectionId::new(1), tx1);
        b.subscribe(ConnectionId::new(2), tx2);

        b.publish(left(9));

        assert_eq!(*rx1.try_recv().unwrap(), left(9));
        assert_eq!(*rx2.try_recv().unwrap(), left(9));
    }

    #[test]
    fn test_targeted_and_except() {
        let mut b = broadcaster();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        b.subscribe(ConnectionId::new(1), tx1);
        b.subscribe(ConnectionId::new(2), tx2);

        b.send_to(ConnectionId::new(2), left(1));
        b.publish_except(ConnectionId::new(2), left(2));

        assert_eq!(*rx1.try_recv().unwrap(), left(2));
        assert!(rx1.try_recv().is_err());
        assert_eq!(*rx2.try_recv().unwrap(), left(1));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let mut b = broadcaster();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        b.subscribe(ConnectionId::new(1), tx1);
        b.subscribe(ConnectionId::new(2), tx2);
        drop(rx1);

        b.publish(left(3));
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_unsubscribe() {
        let mut b = broadcaster();
        let (tx, _rx) = mpsc::unbounded_channel();
        b.subscribe(ConnectionId::new(1), tx);
        assert!(b.unsubscribe(ConnectionId::new(1)));
        assert!(!b.unsubscribe(ConnectionId::new(1)));
        assert!(b.is_empty());
    }
}
