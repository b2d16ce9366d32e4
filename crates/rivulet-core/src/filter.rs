use serde::{Deserialize, Serialize};

use crate::event::{id::EventId, kind::EventKind, tag::Tag, Event, PubKey, Timestamp};

///
/// A subscriber-declared predicate over events.
/// The attributes of a Filter work as `&&` (all the constraints present
/// must hold for an event to pass), while the values inside a single
/// constraint work as `||` (any of them satisfies that constraint).
/// A subscription can carry multiple filters; those are `||`ed as well:
/// anything that matches any of the filters is delivered.
///
/// - ids: allowed event ids (exact or prefix)
/// - authors: allowed author pubkeys (exact or prefix)
/// - kinds: allowed kind numbers
/// - e: allowed values of `"e"` reference tags
/// - p: allowed values of `"p"` reference tags
/// - since: events must be newer than this timestamp to pass
/// - until: events must be older than this timestamp to pass
/// - limit: maximum number of events returned by the historical
///   backfill; live fan-out ignores it
///
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Filter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ids: Option<Vec<EventId>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub authors: Option<Vec<PubKey>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kinds: Option<Vec<EventKind>>,
  #[serde(alias = "#e", rename(serialize = "#e"), skip_serializing_if = "Option::is_none")]
  pub e: Option<Vec<String>>,
  #[serde(alias = "#p", rename(serialize = "#p"), skip_serializing_if = "Option::is_none")]
  pub p: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub since: Option<Timestamp>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub until: Option<Timestamp>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u64>,
}

impl Filter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_ids(&mut self, ids: Vec<String>) -> &mut Self {
    if ids.is_empty() {
      return self;
    }

    self.ids = Some(ids.into_iter().map(EventId).collect());
    self
  }

  pub fn add_authors(&mut self, authors: Vec<String>) -> &mut Self {
    if authors.is_empty() {
      return self;
    }

    self.authors = Some(authors);
    self
  }

  pub fn add_kinds(&mut self, kinds: Vec<u64>) -> &mut Self {
    if kinds.is_empty() {
      return self;
    }

    self.kinds = Some(kinds.into_iter().map(EventKind::from).collect());
    self
  }

  pub fn add_e_tags(&mut self, e_tags: Vec<String>) -> &mut Self {
    if e_tags.is_empty() {
      return self;
    }

    self.e = Some(e_tags);
    self
  }

  pub fn add_p_tags(&mut self, p_tags: Vec<String>) -> &mut Self {
    if p_tags.is_empty() {
      return self;
    }

    self.p = Some(p_tags);
    self
  }

  pub fn add_since(&mut self, since: u64) -> &mut Self {
    self.since = Some(since);
    self
  }

  pub fn add_until(&mut self, until: u64) -> &mut Self {
    self.until = Some(until);
    self
  }

  pub fn add_limit(&mut self, limit: u64) -> &mut Self {
    self.limit = Some(limit);
    self
  }

  ///
  /// Whether `event` satisfies every constraint present in this filter.
  /// Absent constraints always pass; `limit` is not a match constraint.
  ///
  pub fn matches(&self, event: &Event) -> bool {
    if let Some(ids) = &self.ids {
      let id_in_list = ids
        .iter()
        .any(|id| event.id == id.0 || event.id.starts_with(&id.0));
      if !id_in_list {
        return false;
      }
    }

    if let Some(authors) = &self.authors {
      let author_in_list = authors
        .iter()
        .any(|author| event.pubkey == *author || event.pubkey.starts_with(author));
      if !author_in_list {
        return false;
      }
    }

    if let Some(kinds) = &self.kinds {
      if !kinds.iter().any(|kind| *kind == event.kind) {
        return false;
      }
    }

    if let Some(since) = self.since {
      if event.created_at < since {
        return false;
      }
    }

    if let Some(until) = self.until {
      if event.created_at > until {
        return false;
      }
    }

    // Reference-tag constraints pass when any tag of that key carries
    // one of the allowed values.
    if let Some(event_ids) = &self.e {
      let referenced = event.tags.iter().any(|tag| match tag {
        Tag::Event(id, _) => event_ids.iter().any(|allowed| *allowed == id.0),
        _ => false,
      });
      if !referenced {
        return false;
      }
    }

    if let Some(pubkeys) = &self.p {
      let referenced = event.tags.iter().any(|tag| match tag {
        Tag::PubKey(pubkey, _) => pubkeys.iter().any(|allowed| allowed == pubkey),
        _ => false,
      });
      if !referenced {
        return false;
      }
    }

    true
  }

  pub fn as_str(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }

  pub fn from_string(data: String) -> Result<Self, serde_json::error::Error> {
    serde_json::from_str(&data)
  }
}
