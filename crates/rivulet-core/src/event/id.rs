use bitcoin_hashes::{sha256, Hash};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{kind::EventKind, tag::Tag, PubKey, Timestamp};

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EventId(pub String);

impl EventId {
  ///
  /// Content-derived identifier of an event:
  /// the lowercase hex-encoded SHA256 of the canonical serialization
  ///
  /// `[0, <pubkey>, <created_at>, <kind>, <tags>, <content>]`
  ///
  /// Any change to any field yields a different id.
  ///
  pub(crate) fn new(
    pubkey: PubKey,
    created_at: Timestamp,
    kind: EventKind,
    tags: Vec<Tag>,
    content: String,
  ) -> Self {
    let data = json!([0, pubkey, created_at, kind, tags, content]).to_string();

    let hash = sha256::Hash::hash(data.as_bytes());
    Self(hash.to_string())
  }
}

#[cfg(test)]
mod tests {
  use crate::event::tag::UncheckedRelayHint;

  use super::*;

  #[cfg(test)]
  use pretty_assertions::assert_eq;

  fn make_sut() -> (PubKey, Timestamp, EventKind, Vec<Tag>, String) {
    let pubkey: PubKey = String::from("mockpubkey");
    let created_at: Timestamp = 161500343030;
    let kind: EventKind = EventKind::Text;
    let tags: Vec<Tag> = vec![Tag::Event(
      EventId(String::from("event_im_replying_to")),
      Some(UncheckedRelayHint(String::from("wss://some.relay.com"))),
    )];
    let content: String = String::from("mockcontent");

    (pubkey, created_at, kind, tags, content)
  }

  #[test]
  fn id_is_hash_of_canonical_serialization() {
    let (pubkey, created_at, kind, tags, content) = make_sut();

    let event_id = EventId::new(
      pubkey.clone(),
      created_at,
      kind,
      tags.clone(),
      content.clone(),
    );

    let canonical = json!([0, pubkey, created_at, kind, tags, content]).to_string();
    let expected = EventId(sha256::Hash::hash(canonical.as_bytes()).to_string());

    assert_eq!(expected, event_id);
  }

  #[test]
  fn mutating_any_field_changes_the_id() {
    let (pubkey, created_at, kind, tags, content) = make_sut();

    let original = EventId::new(
      pubkey.clone(),
      created_at,
      kind,
      tags.clone(),
      content.clone(),
    );

    let other_content = EventId::new(
      pubkey.clone(),
      created_at,
      kind,
      tags.clone(),
      String::from("othercontent"),
    );
    let other_timestamp = EventId::new(pubkey.clone(), created_at + 1, kind, tags.clone(), content.clone());
    let other_kind = EventId::new(pubkey, created_at, EventKind::Custom(42), tags, content);

    assert_ne!(original, other_content);
    assert_ne!(original, other_timestamp);
    assert_ne!(original, other_kind);
  }
}
