use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::event::Event;

use super::super::Error;

/// `["EVENT", <label>, <event JSON>]` — delivery of a matched event,
/// tagged with the subscription label that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDelivery {
  pub code: String, // "EVENT"
  pub label: String,
  pub event: Event,
}

impl EventDelivery {
  pub fn new_delivery(label: String, event: Event) -> Self {
    Self {
      code: "EVENT".to_string(),
      label,
      event,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    json!(["EVENT", self.label, self.event])
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() != 3 || v[0] != "EVENT" {
      return Err(Error::InvalidData);
    }

    let label = serde_json::from_value(v[1].clone())?;
    let event: Event = serde_json::from_value(v[2].clone())?;
    Ok(Self::new_delivery(label, event))
  }

  /// Get [`EventDelivery`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`EventDelivery`] from JSON string
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

impl Default for EventDelivery {
  fn default() -> Self {
    Self {
      code: String::from("EVENT"),
      label: String::from(""),
      event: Event::default(),
    }
  }
}

impl Serialize for EventDelivery {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for EventDelivery {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    EventDelivery::from_value(json_value).map_err(serde::de::Error::custom)
  }
}
