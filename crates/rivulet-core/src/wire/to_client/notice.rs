use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::super::Error;

/// `["NOTICE", <message>]` — human-readable feedback to one client:
/// rejection reasons, subscription state, shutdown announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub code: String, // "NOTICE"
  pub message: String,
}

impl Notice {
  pub fn new_notice(message: String) -> Self {
    Self {
      code: "NOTICE".to_string(),
      message,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(["NOTICE", self.message])
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() != 2 || v[0] != "NOTICE" {
      return Err(Error::InvalidData);
    }

    let message = serde_json::from_value(v[1].clone())?;
    Ok(Self::new_notice(message))
  }

  /// Get [`Notice`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`Notice`] from JSON string
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

impl Default for Notice {
  fn default() -> Self {
    Self {
      code: String::from("NOTICE"),
      message: String::from(""),
    }
  }
}

impl Serialize for Notice {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for Notice {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    Notice::from_value(json_value).map_err(serde::de::Error::custom)
  }
}
