use std::str::FromStr;

use secp256k1::{schnorr, Secp256k1};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// Event modules
pub mod id;
pub mod kind;
pub mod tag;

use self::id::EventId;
use self::kind::EventKind;
use self::tag::Tag;

use crate::schnorr::SchnorrError;

pub type PubKey = String;
pub type Timestamp = u64;

/// [`Event`] error
#[derive(thiserror::Error, Debug)]
pub enum Error {
  /// Error serializing or deserializing JSON data
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error("Invalid data")]
  InvalidData,
}

///
/// The canonical signed message unit relayed by this system.
/// Immutable once accepted: its `id` is derived from its content
/// and its `sig` binds the author to that id.
///
/// Example:
///   ```json
///   {
///     "id": "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
///     "pubkey": "614a695bab54e8dc98946abdb8ec019599ece6dada0c23890977d0fa128081d6",
///     "created_at": 1673002822,
///     "kind": 1,
///     "tags": [
///       ["e", "688787d8ff144c502c7f5cffaafe2cc588d86079f9de88304c26b0cb99ce91c6", "wss://some.relay.com"],
///       ["p", "02c7e1b1e9c175ab2d100baf1d5a66e73ecc044e9f8093d0c965741f26aa3abf76"],
///     ],
///     "content": "Lorem ipsum dolor sit amet",
///     "sig": "e8551d85f530113366e8da481354c2756605e3f58149cedc1fb9385d35251712b954af8ef891cb0467d50ddc6685063d4190c97e9e131f903e6e4176dc13ce7c"
///   }
///   ```
///
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Event {
  /// 32-bytes SHA256 of the canonical serialized event data
  pub id: String,
  /// 32-bytes hex-encoded public key of the event author
  pub pubkey: PubKey,
  /// Unix timestamp in seconds, claimed by the signer
  pub created_at: Timestamp,
  /// Kind of event
  pub kind: EventKind,
  /// Ordered tag-entries used for indexed filter matching
  pub tags: Vec<Tag>,
  /// Arbitrary string. Meaning depends on the kind of the event.
  pub content: String,
  /// 64-bytes hex schnorr signature of the id field
  pub sig: String,
}

impl Event {
  /// Builds an event with its content-derived `id` already computed,
  /// leaving `sig` empty until [`Event::sign`] is called.
  pub fn new_without_signature(
    pubkey: PubKey,
    created_at: Timestamp,
    kind: EventKind,
    tags: Vec<Tag>,
    content: String,
  ) -> Self {
    let id = EventId::new(
      pubkey.clone(),
      created_at,
      kind,
      tags.clone(),
      content.clone(),
    );
    Self {
      id: id.0,
      pubkey,
      created_at,
      kind,
      tags,
      content,
      ..Default::default()
    }
  }

  /// Signs the event id with the given secret key.
  pub fn sign(&mut self, seckey: Vec<u8>) -> Result<(), SchnorrError> {
    let secp = Secp256k1::new();
    let signed = crate::schnorr::sign_schnorr(&secp, self.id.clone(), seckey)?;
    self.sig = signed.to_string();
    Ok(())
  }

  /// Whether the claimed `id` equals the recomputed content hash.
  pub fn check_event_id(&self) -> bool {
    EventId::new(
      self.pubkey.clone(),
      self.created_at,
      self.kind,
      self.tags.clone(),
      self.content.clone(),
    )
    .0 == self.id
  }

  /// Whether `sig` verifies over `id` against `pubkey`.
  pub fn check_event_signature(&self) -> bool {
    let secp = Secp256k1::new();
    let sig = match schnorr::Signature::from_str(&self.sig) {
      Ok(signature) => signature,
      Err(_) => return false,
    };

    crate::schnorr::verify_schnorr(&secp, self.id.clone(), sig, self.pubkey.clone())
      .unwrap_or(false)
  }

  /// Deserializes from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    serde_json::from_value(msg).map_err(Error::Json)
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(self)
  }

  /// Deserialize [`Event`] from JSON string
  pub fn from_json<S>(msg: S) -> Result<Self, Error>
  where
    S: Into<String>,
  {
    let msg: &str = &msg.into();

    if msg.is_empty() {
      return Err(Error::InvalidData);
    }

    let value: Value = serde_json::from_str(msg)?;
    Self::from_value(value)
  }

  /// Get [`Event`] in JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }
}
