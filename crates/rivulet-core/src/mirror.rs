use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;
use uuid::Uuid;

use crate::bridge::PublisherBridge;
use crate::config::MirrorSettings;
use crate::filter::Filter;
use crate::wire::from_client::subscribe::SubscribeMessage;
use crate::wire::to_client::{eose::EndOfStoredEvents, event::EventDelivery};

/// [`Mirror`] error
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
  #[error(transparent)]
  Address(#[from] url::ParseError),
  #[error(transparent)]
  Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

///
/// Content-mirroring poller: periodically pulls plain notes from the
/// upstream feed and republishes their text through the publisher
/// bridge, where they become events authored by this relay. Feed
/// errors are logged and retried on the next cycle; the relay core
/// never sees them.
///
/// The cursor tracking the newest item already seen is in-memory only,
/// so a restart re-reads the feed from the beginning; idempotent
/// storage absorbs the resubmissions.
///
pub async fn run_mirror(settings: MirrorSettings, bridge: Arc<PublisherBridge>) {
  info!("mirroring content from {}", settings.url);
  let mut cursor: u64 = 0;

  loop {
    match mirror_once(&settings.url, &mut cursor, &bridge).await {
      Ok(mirrored) => {
        if mirrored > 0 {
          info!("mirrored {mirrored} item(s) from {}", settings.url);
        }
      }
      Err(err) => error!("mirror cycle against {} failed: {err}", settings.url),
    }
    sleep(settings.interval).await;
  }
}

///
/// One polling cycle: connect, subscribe to plain notes newer than the
/// cursor, submit every delivered item's text, stop at the
/// end-of-stored-events marker. Returns how many items were submitted.
///
async fn mirror_once(
  upstream: &str,
  cursor: &mut u64,
  bridge: &PublisherBridge,
) -> Result<usize, MirrorError> {
  // validate the address before handing it to the websocket stack
  Url::parse(upstream)?;
  let (mut ws, _) = connect_async(upstream).await?;

  let label = Uuid::new_v4().to_string();
  let mut filter = Filter::new();
  filter.add_kinds(vec![1]);
  if *cursor > 0 {
    filter.add_since(*cursor + 1);
  }
  let request = SubscribeMessage::new_subscribe(label.clone(), vec![filter]);
  ws.send(Message::Text(request.as_json())).await?;

  let mut mirrored = 0;
  while let Some(msg) = ws.next().await {
    match msg? {
      Message::Text(frame) => {
        if let Ok(delivery) = EventDelivery::from_json(frame.clone()) {
          if delivery.label != label {
            continue;
          }
          match bridge.submit_content(&delivery.event.content) {
            Ok(event) => {
              debug!("mirrored feed item into note {}", event.id);
              mirrored += 1;
            }
            Err(err) => error!("republishing a feed item failed: {err}"),
          }
          *cursor = (*cursor).max(delivery.event.created_at);
        } else if let Ok(eose) = EndOfStoredEvents::from_json(frame) {
          if eose.label == label {
            break;
          }
        }
      }
      Message::Close(_) => break,
      _ => {}
    }
  }

  let _ = ws.close(None).await;
  Ok(mirrored)
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;
  use crate::engine::RelayEngine;
  use crate::event::Event;
  use crate::schnorr::generate_keys;
  use crate::store::EventStore;
  use tokio_tungstenite::accept_async;

  #[cfg(test)]
  use pretty_assertions::assert_eq;

  struct Sut {
    engine: Arc<RelayEngine>,
    bridge: Arc<PublisherBridge>,
    table_name: String,
  }

  impl Drop for Sut {
    fn drop(&mut self) {
      let _ = fs::remove_file(format!("db/{}.redb", self.table_name));
    }
  }

  impl Sut {
    fn new(table_name: &str) -> Self {
      let store = Arc::new(EventStore::new(Some(table_name.to_string())).unwrap());
      let engine = Arc::new(RelayEngine::new(store));
      let bridge = Arc::new(PublisherBridge::new(Arc::clone(&engine), generate_keys()));
      Self {
        engine,
        bridge,
        table_name: table_name.to_owned(),
      }
    }
  }

  fn feed_item(content: &str, created_at: u64) -> Event {
    Event {
      id: format!("feed-{created_at}"),
      pubkey: String::from("upstream"),
      created_at,
      content: content.to_string(),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn mirror_republishes_feed_items_and_advances_the_cursor() {
    let sut = Sut::new("mirror_republishes");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let feed = tokio::spawn(async move {
      let (stream, _) = listener.accept().await.unwrap();
      let mut ws = accept_async(stream).await.unwrap();

      let request = match ws.next().await.unwrap().unwrap() {
        Message::Text(frame) => SubscribeMessage::from_json(frame).unwrap(),
        other => panic!("expected a subscribe frame, got {other:?}"),
      };

      for (content, created_at) in [("first tweet", 10), ("second tweet", 20)] {
        let delivery =
          EventDelivery::new_delivery(request.label.clone(), feed_item(content, created_at));
        ws.send(Message::Text(delivery.as_json())).await.unwrap();
      }
      let eose = EndOfStoredEvents::new_eose(request.label.clone());
      ws.send(Message::Text(eose.as_json())).await.unwrap();
    });

    let mut cursor = 0u64;
    let mirrored = mirror_once(&format!("ws://{addr}"), &mut cursor, &sut.bridge)
      .await
      .unwrap();
    feed.await.unwrap();

    assert_eq!(mirrored, 2);
    assert_eq!(cursor, 20);

    // both items are now stored as notes authored by the relay itself
    let (connection, _rx) = sut.engine.attach();
    let mut filter = Filter::new();
    filter.add_authors(vec![sut.bridge.relay_pubkey()]);
    let stored = sut
      .engine
      .subscribe(connection, String::from("mirrored"), vec![filter])
      .unwrap();

    let mut contents: Vec<String> = stored.into_iter().map(|event| event.content).collect();
    contents.sort();
    assert_eq!(contents, vec!["first tweet", "second tweet"]);
  }

  #[tokio::test]
  async fn mirror_resumes_past_the_cursor() {
    let sut = Sut::new("mirror_resumes");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let feed = tokio::spawn(async move {
      let (stream, _) = listener.accept().await.unwrap();
      let mut ws = accept_async(stream).await.unwrap();

      let request = match ws.next().await.unwrap().unwrap() {
        Message::Text(frame) => SubscribeMessage::from_json(frame).unwrap(),
        other => panic!("expected a subscribe frame, got {other:?}"),
      };
      // only items newer than the cursor may be requested
      assert_eq!(request.filters[0].since, Some(6));

      let eose = EndOfStoredEvents::new_eose(request.label.clone());
      ws.send(Message::Text(eose.as_json())).await.unwrap();
    });

    let mut cursor = 5u64;
    let mirrored = mirror_once(&format!("ws://{addr}"), &mut cursor, &sut.bridge)
      .await
      .unwrap();
    feed.await.unwrap();

    assert_eq!(mirrored, 0);
    assert_eq!(cursor, 5);
  }

  #[tokio::test]
  async fn mirror_surfaces_unreachable_upstreams() {
    let sut = Sut::new("mirror_unreachable");
    let mut cursor = 0u64;

    // nothing is listening on this port
    let result = mirror_once("ws://127.0.0.1:1", &mut cursor, &sut.bridge).await;

    assert!(result.is_err());
  }
}
