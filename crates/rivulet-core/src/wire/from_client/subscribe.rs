use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::filter::Filter;

use super::super::Error;

/// `["REQ", <label>, <filter JSON>...]` — a client declaring interest.
/// At least one filter is required; multiple filters are `||`ed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeMessage {
  pub code: String, // "REQ"
  pub label: String,
  pub filters: Vec<Filter>,
}

impl SubscribeMessage {
  pub fn new_subscribe(label: String, filters: Vec<Filter>) -> Self {
    Self {
      code: "REQ".to_string(),
      label,
      filters,
    }
  }

  /// Serialize as [`Value`]
  pub fn as_value(&self) -> Value {
    let mut frame = vec![json!("REQ"), json!(self.label)];
    for filter in &self.filters {
      frame.push(json!(filter));
    }
    Value::Array(frame)
  }

  /// Deserialize from [`Value`]
  pub fn from_value(msg: Value) -> Result<Self, Error> {
    let v = msg.as_array().ok_or(Error::InvalidData)?;

    if v.len() < 3 || v[0] != "REQ" {
      return Err(Error::InvalidData);
    }

    let label: String = serde_json::from_value(v[1].clone())?;
    let mut filters: Vec<Filter> = vec![];
    for filter in v[2..].iter() {
      filters.push(serde_json::from_value(filter.clone())?);
    }

    Ok(Self::new_subscribe(label, filters))
  }

  /// Get [`SubscribeMessage`] as JSON string
  pub fn as_json(&self) -> String {
    self.as_value().to_string()
  }

  /// Get [`SubscribeMessage`] from JSON string
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

impl Default for SubscribeMessage {
  fn default() -> Self {
    Self {
      code: String::from("REQ"),
      label: String::new(),
      filters: vec![Filter::default()],
    }
  }
}

impl Serialize for SubscribeMessage {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    self.as_value().serialize(serializer)
  }
}

impl<'de> Deserialize<'de> for SubscribeMessage {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    let json_value: Value = Value::deserialize(deserializer)?;
    SubscribeMessage::from_value(json_value).map_err(serde::de::Error::custom)
  }
}
