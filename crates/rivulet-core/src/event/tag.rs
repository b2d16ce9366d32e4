use serde::de::Error as DeserializerError;
use serde::{ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{EventId, PubKey};

/// [`Tag`] error
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("a tag must have at least a kind element")]
  KindNotFound,
}

/// Relay address a tag may carry alongside its value.
/// Opaque to this relay; it is kept verbatim so the event
/// round-trips byte-identically.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UncheckedRelayHint(pub String);

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum TagKind {
  /// `["p", <pubkey>, <relay-hint>]` — references an author.
  PubKey,
  /// `["e", <event-id>, <relay-hint>]` — references another event.
  Event,
  /// Any tag key this relay does not interpret.
  Custom(String),
}

impl fmt::Display for TagKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::PubKey => write!(f, "p"),
      Self::Event => write!(f, "e"),
      Self::Custom(tag) => write!(f, "{tag}"),
    }
  }
}

impl<S> From<S> for TagKind
where
  S: Into<String>,
{
  fn from(s: S) -> Self {
    let s: String = s.into();
    match s.as_str() {
      "p" => Self::PubKey,
      "e" => Self::Event,
      tag => Self::Custom(tag.to_string()),
    }
  }
}

impl From<&Tag> for TagKind {
  fn from(data: &Tag) -> Self {
    match data {
      Tag::Generic(kind, _) => kind.clone(),
      Tag::Event(_, _) => TagKind::Event,
      Tag::PubKey(_, _) => TagKind::PubKey,
    }
  }
}

/// A tag-entry: an ordered sequence of strings whose first element
/// names the key. Reference tags (`e`, `p`) get typed variants so
/// filter matching can index them without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
  /// A tag whose key this relay does not interpret; kept as-is.
  Generic(TagKind, Vec<String>),
  Event(EventId, Option<UncheckedRelayHint>),
  PubKey(PubKey, Option<UncheckedRelayHint>),
}

impl<S> TryFrom<Vec<S>> for Tag
where
  S: Into<String>,
{
  type Error = Error;

  fn try_from(tag: Vec<S>) -> Result<Self, Self::Error> {
    let tag: Vec<String> = tag.into_iter().map(|v| v.into()).collect();
    let tag_kind: TagKind = match tag.first() {
      Some(kind) => TagKind::from(kind),
      None => return Err(Error::KindNotFound),
    };

    match tag.len() {
      1 => Ok(Self::Generic(tag_kind, vec![])),
      2 => {
        let value: String = tag[1].clone();
        match tag_kind {
          TagKind::PubKey => Ok(Self::PubKey(value, None)),
          TagKind::Event => Ok(Self::Event(EventId(value), None)),
          _ => Ok(Self::Generic(tag_kind, vec![value])),
        }
      }
      _ => {
        let hint = (!tag[2].is_empty()).then_some(UncheckedRelayHint(tag[2].clone()));
        match tag_kind {
          TagKind::PubKey => Ok(Self::PubKey(tag[1].clone(), hint)),
          TagKind::Event => Ok(Self::Event(EventId(tag[1].clone()), hint)),
          _ => Ok(Self::Generic(tag_kind, tag[1..].to_vec())),
        }
      }
    }
  }
}

impl From<Tag> for Vec<String> {
  fn from(data: Tag) -> Self {
    match data {
      Tag::Generic(kind, values) => vec![vec![kind.to_string()], values].concat(),
      Tag::Event(event_id, relay_hint) => {
        let mut event_tag = vec![TagKind::Event.to_string(), event_id.0];
        if let Some(hint) = relay_hint {
          event_tag.push(hint.0);
        }
        event_tag
      }
      Tag::PubKey(pubkey, relay_hint) => {
        let mut pubkey_tag = vec![TagKind::PubKey.to_string(), pubkey];
        if let Some(hint) = relay_hint {
          pubkey_tag.push(hint.0);
        }
        pubkey_tag
      }
    }
  }
}

impl Serialize for Tag {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    let data: Vec<String> = self.clone().into();
    let mut seq = serializer.serialize_seq(Some(data.len()))?;
    for element in data.into_iter() {
      seq.serialize_element(&element)?;
    }
    seq.end()
  }
}

impl<'de> Deserialize<'de> for Tag {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let vec: Vec<String> = Vec::deserialize(deserializer)?;
    Self::try_from(vec).map_err(DeserializerError::custom)
  }
}
