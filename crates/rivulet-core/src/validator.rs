use crate::event::Event;

/// Reasons an inbound event is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("missing or empty field: {0}")]
  MissingField(&'static str),
  #[error("event id does not match its content hash")]
  InvalidId,
  #[error("signature does not verify against the author")]
  InvalidSignature,
}

///
/// Decides whether a structurally parsed event is well-formed and
/// authentic. Pure and deterministic: no side effects, safe to call
/// concurrently without synchronization.
///
/// Checks run in order of cost: field presence, then the content-hash
/// identity, then the schnorr signature.
///
pub fn validate(event: &Event) -> Result<(), ValidationError> {
  if event.id.is_empty() {
    return Err(ValidationError::MissingField("id"));
  }
  if event.pubkey.is_empty() {
    return Err(ValidationError::MissingField("pubkey"));
  }
  if event.sig.is_empty() {
    return Err(ValidationError::MissingField("sig"));
  }

  if !event.check_event_id() {
    return Err(ValidationError::InvalidId);
  }

  if !event.check_event_signature() {
    return Err(ValidationError::InvalidSignature);
  }

  Ok(())
}
