use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::event::Event;
use crate::filter::Filter;
use crate::registry::{ConnectionId, SubscriptionRegistry};
use crate::store::{EventStore, PutOutcome, StoreError};
use crate::validator::{self, ValidationError};
use crate::wire::to_client::{event::EventDelivery, notice::Notice};

pub type Tx = mpsc::Sender<Message>;

/// Outbound frames queued per connection before the relay gives up on a
/// subscriber that is not draining its socket.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 512;

/// Why a publish was not accepted. Scoped to the originating caller;
/// other connections never observe it.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  #[error("invalid event: {0}")]
  Validation(#[from] ValidationError),
  #[error("unable to persist event: {0}")]
  Storage(#[from] StoreError),
}

/// What happened to an accepted publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
  /// First acceptance: the event is durable and was fanned out to
  /// `delivered` matching subscriptions.
  Accepted { delivered: usize },
  /// The event was already stored; no fan-out (each event is broadcast
  /// at most once, at its first acceptance).
  Duplicate,
}

///
/// Orchestrates validate -> store -> match -> fan-out for every event,
/// and owns the connection set. One gateway task per connection calls in
/// concurrently; all methods take `&self` and never require one
/// connection to wait on another connection's command.
///
pub struct RelayEngine {
  store: Arc<EventStore>,
  registry: SubscriptionRegistry,
  connections: Mutex<HashMap<ConnectionId, Tx>>,
  next_connection_id: AtomicU64,
}

impl RelayEngine {
  pub fn new(store: Arc<EventStore>) -> Self {
    Self {
      store,
      registry: SubscriptionRegistry::new(),
      connections: Mutex::new(HashMap::new()),
      next_connection_id: AtomicU64::new(0),
    }
  }

  /// Registers a new connection and hands back the receiving half of
  /// its bounded outbound queue for the gateway to pump into the socket.
  pub fn attach(&self) -> (ConnectionId, mpsc::Receiver<Message>) {
    let connection = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    self.connections.lock().unwrap().insert(connection, tx);
    (connection, rx)
  }

  /// The outbound sender of a connection, if it is still attached.
  pub fn sender(&self, connection: ConnectionId) -> Option<Tx> {
    self.connections.lock().unwrap().get(&connection).cloned()
  }

  ///
  /// Publish path: validate, persist, and -- on first acceptance only --
  /// deliver to every matching subscription, including the publisher's
  /// own (self-subscription is not suppressed). Storage acceptance
  /// happens-before fan-out begins.
  ///
  pub fn publish(&self, event: Event) -> Result<PublishOutcome, PublishError> {
    validator::validate(&event)?;

    match self.store.put(&event)? {
      PutOutcome::AlreadyExists => {
        debug!("duplicate event {}; skipping fan-out", event.id);
        Ok(PublishOutcome::Duplicate)
      }
      PutOutcome::Inserted => {
        let matched = self.registry.matching_subscriptions(&event);
        let delivered = self.fan_out(&event, matched);
        Ok(PublishOutcome::Accepted { delivered })
      }
    }
  }

  ///
  /// Entry point for the publisher bridge: events injected by the
  /// content-mirroring collaborator take exactly the publish path, as if
  /// they came from a synthetic, relay-authored connection.
  ///
  pub fn ingest_external(&self, event: Event) -> Result<PublishOutcome, PublishError> {
    self.publish(event)
  }

  ///
  /// Upserts the subscription and returns the historical backfill for
  /// its filters. Registration happens before the query so a publish
  /// racing this call can be delivered twice but never lost.
  ///
  pub fn subscribe(
    &self,
    connection: ConnectionId,
    label: String,
    filters: Vec<Filter>,
  ) -> Result<Vec<Event>, StoreError> {
    self.registry.subscribe(connection, label, filters.clone());
    self.store.query(&filters)
  }

  /// Removes the subscription under `label`. Returns whether it existed.
  pub fn unsubscribe(&self, connection: ConnectionId, label: &str) -> bool {
    self.registry.unsubscribe(connection, label)
  }

  /// Tears a connection down: all its subscriptions go away and no
  /// further events are delivered to it.
  pub fn disconnect(&self, connection: ConnectionId) {
    self.registry.drop_connection(connection);
    self.connections.lock().unwrap().remove(&connection);
  }

  /// Queues a text frame to one connection. Returns false when the
  /// connection is gone or was dropped for not draining its queue.
  pub fn send_to_client(&self, connection: ConnectionId, content: String) -> bool {
    self.send_raw(connection, Message::Text(content))
  }

  /// Queues a raw websocket message to one connection.
  pub fn send_raw(&self, connection: ConnectionId, msg: Message) -> bool {
    let tx = match self.sender(connection) {
      Some(tx) => tx,
      None => return false,
    };
    match tx.try_send(msg) {
      Ok(()) => true,
      Err(mpsc::error::TrySendError::Full(_)) => {
        warn!("outbound queue full for {connection}; dropping connection");
        self.disconnect(connection);
        false
      }
      Err(mpsc::error::TrySendError::Closed(_)) => {
        self.disconnect(connection);
        false
      }
    }
  }

  /// Announces shutdown and closes every connection.
  pub fn close_all(&self, message: String) {
    let connections = self.connections.lock().unwrap();
    let notice = Notice::new_notice(message).as_json();
    for tx in connections.values() {
      let _ = tx.try_send(Message::Text(notice.clone()));
      let _ = tx.try_send(Message::Close(None));
    }
  }

  ///
  /// Delivery to matched subscriptions. A subscriber with a full queue
  /// is disconnected instead of stalling the publisher; a closed queue
  /// is pruned. Neither surfaces an error to the publishing side.
  ///
  fn fan_out(&self, event: &Event, matched: Vec<(ConnectionId, String)>) -> usize {
    let mut delivered = 0;
    let mut dropped: Vec<ConnectionId> = vec![];
    {
      let connections = self.connections.lock().unwrap();
      for (connection, label) in matched {
        let tx = match connections.get(&connection) {
          Some(tx) => tx,
          None => continue, // raced a teardown; delivery abandoned
        };
        let frame = EventDelivery::new_delivery(label, event.clone()).as_json();
        match tx.try_send(Message::Text(frame)) {
          Ok(()) => delivered += 1,
          Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("outbound queue full for {connection}; dropping connection");
            dropped.push(connection);
          }
          Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(connection),
        }
      }
    }
    for connection in dropped {
      self.disconnect(connection);
    }
    delivered
  }
}
