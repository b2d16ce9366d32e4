use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::event::Event;

use super::super::Error;

/// `["EVENT", <event JSON>]` — a client publishing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
  pub code: String, // "EVENT"
  pub event: Event,
}

impl PublishMessage {
  pub fn new_publish(event: Event) -> Self {
    Self {
      code: "EVENT".to_string(),
      event,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(["EVENT", self.event])
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() != 2 || v[0] != "EVENT" {
      return Err(Error::InvalidData);
    }

    let event: Event = serde_json::from_value(v[1].clone())?;
    Ok(Self::new_publish(event))
  }

  /// Get [`PublishMessage`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`PublishMessage`] from JSON string
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
}

impl Default for PublishMessage {
  fn default() -> Self {
    Self {
      code: String::from("EVENT"),
      event: Event::default(),
    }
  }
}

impl Serialize for PublishMessage {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for PublishMessage {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    PublishMessage::from_value(json_value).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[cfg(test)]
  use pretty_assertions::assert_eq;

  #[test]
  fn serializes_as_tagged_array() {
    let publish = PublishMessage::default();
    let expected = json!(["EVENT", Event::default()]).to_string();

    assert_eq!(publish.as_json(), expected);
  }

  #[test]
  fn deserializes_correctly() {
    let event = Event {
      content: String::from("potato"),
      ..Default::default()
    };
    let serialized = json!(["EVENT", event]).to_string();

    assert_eq!(
      PublishMessage::from_json(serialized).unwrap(),
      PublishMessage::new_publish(event)
    );
  }

  #[test]
  fn rejects_frames_with_the_wrong_tag_or_arity() {
    let wrong_tag = json!(["REQ", Event::default()]).to_string();
    let wrong_arity = json!(["EVENT", Event::default(), "extra"]).to_string();

    assert!(PublishMessage::from_json(wrong_tag).is_err());
    assert!(PublishMessage::from_json(wrong_arity).is_err());
    assert!(PublishMessage::from_json("").is_err());
  }
}
