//! Wire protocol: every frame is a JSON array whose first element tags
//! the frame kind.
//!
//! Client to relay:
//!
//!  - `["EVENT", event_JSON]`: publish an event.
//!
//!  - `["REQ", label, filter_JSON...]`: subscribe under `label`.
//!       A subscribe frame may carry multiple filters; events matching
//!       any of them are delivered, i.e. multiple filters are `||`ed.
//!
//!  - `["CLOSE", label]`: withdraw the subscription under `label`.
//!
//! Relay to client:
//!
//!  - `["EVENT", label, event_JSON]`: delivery of a matched event,
//!       tagged with the subscription that matched it.
//!
//!  - `["EOSE", label]`: end of the historical backfill for `label`;
//!       everything after this frame is live.
//!
//!  - `["NOTICE", message]`: human-readable feedback (rejections,
//!       subscription state, shutdown).

pub mod from_client;
pub mod to_client;

/// Wire frame error
#[derive(thiserror::Error, Debug)]
pub enum Error {
  /// Error serializing or deserializing JSON data
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error("Invalid data")]
  InvalidData,
}

impl serde::de::Error for Error {
  fn custom<T>(_msg: T) -> Self
  where
    T: std::fmt::Display,
  {
    Self::InvalidData
  }
}
