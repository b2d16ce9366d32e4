use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::super::Error;

/// `["EOSE", <label>]` — marks the end of the historical backfill for a
/// subscription; every later `EVENT` frame under the label is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfStoredEvents {
  pub code: String, // "EOSE"
  pub label: String,
}

impl EndOfStoredEvents {
  pub fn new_eose(label: String) -> Self {
    Self {
      code: "EOSE".to_string(),
      label,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(["EOSE", self.label])
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() != 2 || v[0] != "EOSE" {
      return Err(Error::InvalidData);
    }

    let label = serde_json::from_value(v[1].clone())?;
    Ok(Self::new_eose(label))
  }

  /// Get [`EndOfStoredEvents`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`EndOfStoredEvents`] from JSON string
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

impl Default for EndOfStoredEvents {
  fn default() -> Self {
    Self {
      code: String::from("EOSE"),
      label: String::from(""),
    }
  }
}

impl Serialize for EndOfStoredEvents {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for EndOfStoredEvents {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    EndOfStoredEvents::from_value(json_value).map_err(serde::de::Error::custom)
  }
}
