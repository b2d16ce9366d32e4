use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;

use crate::engine::{PublishError, PublishOutcome, RelayEngine};
use crate::event::{kind::EventKind, Event};
use crate::schnorr::{AsymmetricKeys, SchnorrError};

#[cfg(not(test))]
fn get_time_now() -> SystemTime {
  SystemTime::now()
}

#[allow(dead_code)]
const SECONDS_AFTER_UNIX_EPOCH_FOR_TIME_NOW_CONFIG_TEST: u64 = 1684589418u64;
#[cfg(test)]
fn get_time_now() -> SystemTime {
  UNIX_EPOCH + std::time::Duration::new(SECONDS_AFTER_UNIX_EPOCH_FOR_TIME_NOW_CONFIG_TEST, 0)
}

/// [`PublisherBridge`] error
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
  #[error(transparent)]
  Signing(#[from] SchnorrError),
  #[error(transparent)]
  Publish(#[from] PublishError),
}

///
/// The entry point the content-mirroring collaborator uses to inject
/// events. Each submission becomes a plain note authored and signed by
/// the relay's own identity and routed through the regular publish
/// path, so mirrored content is indistinguishable from directly
/// published content once accepted.
///
pub struct PublisherBridge {
  engine: Arc<RelayEngine>,
  keys: AsymmetricKeys,
}

impl PublisherBridge {
  pub fn new(engine: Arc<RelayEngine>, keys: AsymmetricKeys) -> Self {
    Self { engine, keys }
  }

  /// The relay's own author identity, as carried in events it signs.
  pub fn relay_pubkey(&self) -> String {
    self.keys.x_only_public_key()
  }

  ///
  /// Wraps `text` in a self-signed plain note (empty tags, current
  /// timestamp) and publishes it. Returns the accepted event, including
  /// when it turns out to be a duplicate of an earlier submission.
  ///
  pub fn submit_content(&self, text: &str) -> Result<Event, BridgeError> {
    let created_at = get_time_now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs();

    let mut event = Event::new_without_signature(
      self.relay_pubkey(),
      created_at,
      EventKind::Text,
      vec![],
      text.to_string(),
    );
    event.sign(self.keys.private_key.secret_bytes().to_vec())?;

    match self.engine.ingest_external(event.clone())? {
      PublishOutcome::Accepted { delivered } => {
        info!("mirrored note {} delivered to {delivered} subscription(s)", event.id);
      }
      PublishOutcome::Duplicate => {
        info!("mirrored note {} was already known", event.id);
      }
    }

    Ok(event)
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use crate::filter::Filter;
  use crate::schnorr::generate_keys;
  use crate::store::EventStore;
  use crate::validator;
  use crate::wire::to_client::event::EventDelivery;

  #[cfg(test)]
  use pretty_assertions::assert_eq;

  struct Sut {
    engine: Arc<RelayEngine>,
    bridge: PublisherBridge,
    table_name: String,
  }

  impl Drop for Sut {
    fn drop(&mut self) {
      let _ = fs::remove_file(format!("db/{}.redb", self.table_name));
    }
  }

  impl Sut {
    fn new(table_name: &str) -> Self {
      let store = Arc::new(EventStore::new(Some(table_name.to_string())).unwrap());
      let engine = Arc::new(RelayEngine::new(store));
      let bridge = PublisherBridge::new(Arc::clone(&engine), generate_keys());
      Self {
        engine,
        bridge,
        table_name: table_name.to_owned(),
      }
    }
  }

  #[tokio::test]
  async fn submitted_content_becomes_a_valid_self_signed_note() {
    let sut = Sut::new("bridge_signs_notes");

    let event = sut.bridge.submit_content("hi").unwrap();

    assert_eq!(event.content, "hi");
    assert_eq!(event.kind, EventKind::Text);
    assert_eq!(event.pubkey, sut.bridge.relay_pubkey());
    assert_eq!(event.tags, vec![]);
    assert_eq!(validator::validate(&event), Ok(()));
  }

  #[tokio::test]
  async fn submitted_content_is_broadcast_like_a_local_publish() {
    let sut = Sut::new("bridge_broadcasts");
    let (subscriber, mut rx) = sut.engine.attach();
    let mut filter = Filter::new();
    filter.add_kinds(vec![1]);
    sut
      .engine
      .subscribe(subscriber, String::from("notes"), vec![filter])
      .unwrap();

    let event = sut.bridge.submit_content("hi").unwrap();

    let delivery = EventDelivery::from_json(rx.recv().await.unwrap().to_string()).unwrap();
    assert_eq!(delivery.label, "notes");
    assert_eq!(delivery.event, event);
  }

  #[tokio::test]
  async fn resubmitting_the_same_text_is_a_duplicate_no_op() {
    let sut = Sut::new("bridge_duplicate_noop");

    // the test clock is pinned, so identical text yields the same id
    let first = sut.bridge.submit_content("hi").unwrap();
    let second = sut.bridge.submit_content("hi").unwrap();

    assert_eq!(first.id, second.id);
  }
}
