use std::collections::HashSet;
use std::fs;

use redb::{Database, ReadableTable, TableDefinition};

use crate::event::Event;
use crate::filter::Filter;

const TABLE_NAME: &str = "events";
const EVENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("events");

/// [`EventStore`] error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error(transparent)]
  Database(#[from] redb::Error),
  #[error("stored event could not be decoded: {0}")]
  Corrupt(#[from] crate::event::Error),
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
  /// First time this id was seen; the event is now durable.
  Inserted,
  /// An event with this id was already stored; nothing was written.
  AlreadyExists,
}

///
/// Durable, idempotent persistence of accepted events, keyed by event id.
/// The single source of truth: an event is broadcast only after its
/// insert here has committed.
///
pub struct EventStore {
  db: Database,
}

impl EventStore {
  pub fn new(events_table_name: Option<String>) -> Result<Self, StoreError> {
    fs::create_dir_all("db/").map_err(redb::Error::from)?;
    let table_name = match events_table_name {
      Some(name) => name,
      None => TABLE_NAME.to_string(),
    };
    let db = Database::create(format!("db/{table_name}.redb"))?;

    let write_txn = db.begin_write()?;
    write_txn.open_table(EVENTS_TABLE)?; // this basically just creates the table if doesn't exist
    write_txn.commit()?;

    Ok(Self { db })
  }

  ///
  /// Inserts `event` unless an event with the same id is already stored.
  /// The uniqueness check and the insert share one write transaction, so
  /// concurrent calls for the same id resolve to exactly one
  /// [`PutOutcome::Inserted`]; every other caller sees
  /// [`PutOutcome::AlreadyExists`].
  ///
  pub fn put(&self, event: &Event) -> Result<PutOutcome, StoreError> {
    let write_txn = self.db.begin_write()?;
    let outcome = {
      let mut table = write_txn.open_table(EVENTS_TABLE)?;
      if table.get(event.id.as_str())?.is_some() {
        PutOutcome::AlreadyExists
      } else {
        table.insert(event.id.as_str(), event.as_json().as_str())?;
        PutOutcome::Inserted
      }
    };
    write_txn.commit()?;
    Ok(outcome)
  }

  /// Exact-match lookup by event id.
  pub fn get(&self, id: &str) -> Result<Option<Event>, StoreError> {
    let read_txn = self.db.begin_read()?;
    let table = read_txn.open_table(EVENTS_TABLE)?;
    let result = match table.get(id)? {
      Some(stored) => Ok(Some(Event::from_json(stored.value())?)),
      None => Ok(None),
    };
    result
  }

  ///
  /// Historical backfill: the union of stored events matching any of
  /// `filters`, deduplicated by id, newest first. Each filter's `limit`
  /// bounds its own contribution.
  ///
  pub fn query(&self, filters: &[Filter]) -> Result<Vec<Event>, StoreError> {
    let read_txn = self.db.begin_read()?;
    let table = read_txn.open_table(EVENTS_TABLE)?;

    let mut stored: Vec<Event> = vec![];
    for entry in table.iter()? {
      let (_, value) = entry?;
      stored.push(Event::from_json(value.value())?);
    }

    let mut selected: Vec<Event> = vec![];
    let mut seen: HashSet<String> = HashSet::new();
    for filter in filters {
      let mut matched: Vec<&Event> = stored.iter().filter(|event| filter.matches(event)).collect();
      matched.sort_by(|event1, event2| event2.created_at.cmp(&event1.created_at));
      if let Some(limit) = filter.limit {
        matched.truncate(limit as usize);
      }
      for event in matched {
        if seen.insert(event.id.clone()) {
          selected.push(event.clone());
        }
      }
    }

    // Put the newest events first
    selected.sort_by(|event1, event2| event2.created_at.cmp(&event1.created_at));
    Ok(selected)
  }
}
