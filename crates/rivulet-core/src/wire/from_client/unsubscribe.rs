use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::super::Error;

/// `["CLOSE", <label>]` — a client withdrawing a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeMessage {
  pub code: String, // "CLOSE"
  pub label: String,
}

impl UnsubscribeMessage {
  pub fn new_unsubscribe(label: String) -> Self {
    Self {
      code: "CLOSE".to_string(),
      label,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(["CLOSE", self.label])
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() != 2 || v[0] != "CLOSE" {
      return Err(Error::InvalidData);
    }

    let label = serde_json::from_value(v[1].clone())?;
    Ok(Self::new_unsubscribe(label))
  }

  /// Get [`UnsubscribeMessage`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`UnsubscribeMessage`] from JSON string
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

impl Default for UnsubscribeMessage {
  fn default() -> Self {
    Self {
      code: String::from("CLOSE"),
      label: String::from(""),
    }
  }
}

impl Serialize for UnsubscribeMessage {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for UnsubscribeMessage {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    UnsubscribeMessage::from_value(json_value).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[cfg(test)]
  use pretty_assertions::assert_eq;

  #[test]
  fn round_trips() {
    let unsubscribe = UnsubscribeMessage::new_unsubscribe(String::from("notes"));
    let parsed = UnsubscribeMessage::from_json(unsubscribe.as_json()).unwrap();

    assert_eq!(parsed, unsubscribe);
  }

  #[test]
  fn rejects_frames_with_the_wrong_tag_or_arity() {
    assert!(UnsubscribeMessage::from_json(json!(["REQ", "notes"]).to_string()).is_err());
    assert!(UnsubscribeMessage::from_json(json!(["CLOSE"]).to_string()).is_err());
    assert!(UnsubscribeMessage::from_json("").is_err());
  }
}
