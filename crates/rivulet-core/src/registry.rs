use std::collections::HashMap;
use std::sync::RwLock;

use crate::event::Event;
use crate::filter::Filter;

/// Identifies one live connection for the lifetime of its socket.
/// Allocated by the relay engine; never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "conn-{}", self.0)
  }
}

///
/// Tracks each live connection's active subscriptions:
/// `(connection, label) -> filter set`, filters ORed within a label.
///
/// The map is the only shared mutable structure touched by every
/// connection worker, so mutations go through a write lock scoped to the
/// single call, and matching takes the read side. Filter sets are
/// replaced wholesale under the write lock, so a matching call racing a
/// mutation observes either the previous or the new set, never a torn
/// one. The lock is never held across I/O.
///
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
  subscriptions: RwLock<HashMap<ConnectionId, HashMap<String, Vec<Filter>>>>,
}

impl SubscriptionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Upserts the subscription under `(connection, label)`, replacing any
  /// previous filter set for the same label wholesale.
  pub fn subscribe(&self, connection: ConnectionId, label: String, filters: Vec<Filter>) {
    let mut subscriptions = self.subscriptions.write().unwrap();
    subscriptions
      .entry(connection)
      .or_default()
      .insert(label, filters);
  }

  /// Removes the subscription under `(connection, label)`.
  /// Returns whether it existed.
  pub fn unsubscribe(&self, connection: ConnectionId, label: &str) -> bool {
    let mut subscriptions = self.subscriptions.write().unwrap();
    match subscriptions.get_mut(&connection) {
      Some(labels) => labels.remove(label).is_some(),
      None => false,
    }
  }

  /// Removes every subscription held by `connection`.
  /// Called exactly once at connection teardown; a no-op afterwards.
  pub fn drop_connection(&self, connection: ConnectionId) {
    self.subscriptions.write().unwrap().remove(&connection);
  }

  ///
  /// Every `(connection, label)` holding at least one filter that
  /// matches `event`. Pure predicate evaluation over a read-consistent
  /// view; safe to call concurrently with mutations from other
  /// connections.
  ///
  pub fn matching_subscriptions(&self, event: &Event) -> Vec<(ConnectionId, String)> {
    let subscriptions = self.subscriptions.read().unwrap();
    let mut matched: Vec<(ConnectionId, String)> = vec![];
    for (connection, labels) in subscriptions.iter() {
      for (label, filters) in labels.iter() {
        if filters.iter().any(|filter| filter.matches(event)) {
          matched.push((*connection, label.clone()));
        }
      }
    }
    matched
  }
}
