use std::{io::Error as IoError, net::SocketAddr, sync::Arc};

use futures_util::{future, pin_mut, stream::TryStreamExt, FutureExt, SinkExt, StreamExt};

use log::{debug, error, info};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Duration};
use tokio_tungstenite::tungstenite::Message;

use crate::{
  bridge::PublisherBridge,
  config::Settings,
  engine::{PublishError, PublishOutcome, RelayEngine},
  mirror::run_mirror,
  registry::ConnectionId,
  schnorr::{self, SchnorrError},
  store::{EventStore, StoreError},
  wire::{
    from_client::{
      publish::PublishMessage, subscribe::SubscribeMessage, unsubscribe::UnsubscribeMessage,
    },
    to_client::{eose::EndOfStoredEvents, event::EventDelivery, notice::Notice},
  },
};

/// One parsed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientFrame {
  Publish(PublishMessage),
  Subscribe(SubscribeMessage),
  Unsubscribe(UnsubscribeMessage),
  /// Tagged `EVENT` but the payload is not a structurally valid event.
  /// Reported back to the sender, unlike unknown frames.
  InvalidPublish,
  /// Anything else: logged and ignored, the connection stays open.
  Unknown,
}

/// Sorts an inbound frame into CLOSE, EVENT or REQ.
fn parse_client_frame(msg: &str) -> ClientFrame {
  if let Ok(unsubscribe) = UnsubscribeMessage::from_json(msg.to_string()) {
    debug!("Unsubscribe:\n {:?}\n\n", unsubscribe);
    return ClientFrame::Unsubscribe(unsubscribe);
  }

  if let Ok(publish) = PublishMessage::from_json(msg.to_string()) {
    debug!("Publish:\n {:?}\n\n", publish);
    return ClientFrame::Publish(publish);
  }

  if let Ok(subscribe) = SubscribeMessage::from_json(msg.to_string()) {
    debug!("Subscribe:\n {:?}\n\n", subscribe);
    return ClientFrame::Subscribe(subscribe);
  }

  if let Ok(Value::Array(frame)) = serde_json::from_str::<Value>(msg) {
    if frame.first().map(|tag| tag == "EVENT").unwrap_or(false) {
      return ClientFrame::InvalidPublish;
    }
  }

  ClientFrame::Unknown
}

/// This function is called when the connection relay-client is closed.
fn connection_cleanup(engine: &RelayEngine, connection: ConnectionId, addr: SocketAddr) {
  info!("Client with address {addr} ({connection}) disconnected");
  engine.disconnect(connection);
}

fn notify(engine: &RelayEngine, connection: ConnectionId, message: String) {
  let notice = Notice::new_notice(message).as_json();
  engine.send_to_client(connection, notice);
}

fn on_publish(engine: &RelayEngine, connection: ConnectionId, publish: PublishMessage) {
  match engine.publish(publish.event) {
    Ok(PublishOutcome::Accepted { delivered }) => {
      debug!("event accepted from {connection}; delivered to {delivered} subscription(s)");
    }
    Ok(PublishOutcome::Duplicate) => {
      debug!("event from {connection} was already known; no fan-out");
    }
    Err(err @ PublishError::Validation(_)) => {
      notify(engine, connection, err.to_string());
    }
    Err(err @ PublishError::Storage(_)) => {
      error!("persisting an event from {connection} failed: {err}");
      notify(engine, connection, err.to_string());
    }
  }
}

fn on_subscribe(engine: &RelayEngine, connection: ConnectionId, subscribe: SubscribeMessage) {
  let label = subscribe.label;
  match engine.subscribe(connection, label.clone(), subscribe.filters) {
    Ok(backfill) => {
      // Send one event at a time, newest first, then mark the end of
      // stored events so the client knows everything after is live.
      for event in backfill {
        let delivery = EventDelivery::new_delivery(label.clone(), event).as_json();
        if !engine.send_to_client(connection, delivery) {
          return;
        }
      }
      engine.send_to_client(connection, EndOfStoredEvents::new_eose(label).as_json());
    }
    Err(err) => {
      error!("backfill for {connection} failed: {err}");
      notify(engine, connection, format!("unable to read stored events: {err}"));
    }
  }
}

fn on_unsubscribe(engine: &RelayEngine, connection: ConnectionId, unsubscribe: UnsubscribeMessage) {
  let removed = engine.unsubscribe(connection, &unsubscribe.label);
  let message = if removed {
    "Subscription ended.".to_owned()
  } else {
    "Subscription not found.".to_owned()
  };
  notify(engine, connection, message);
}

async fn handle_connection(raw_stream: TcpStream, addr: SocketAddr, engine: Arc<RelayEngine>) {
  let ws_stream = match tokio_tungstenite::accept_async(raw_stream).await {
    Ok(ws_stream) => ws_stream,
    Err(err) => {
      error!("websocket handshake with {addr} failed: {err}");
      return;
    }
  };
  info!("WebSocket connection established: {addr}");

  let (connection, mut rx) = engine.attach();

  // Start a periodic timer to send ping messages
  let ping_interval = Duration::from_secs(20);
  let mut interval = time::interval(ping_interval);

  let (mut outgoing, incoming) = ws_stream.split();

  let ping = async {
    loop {
      interval.tick().await;

      if !engine.send_raw(connection, Message::Ping(vec![])) {
        break Err(tokio_tungstenite::tungstenite::Error::Protocol(
          tokio_tungstenite::tungstenite::error::ProtocolError::SendAfterClosing,
        ));
      }
      debug!("Sent ping to {addr}.");
    }
  };

  let broadcast_incoming = incoming.try_for_each(|msg| {
    let text = match msg.to_text() {
      Ok(text) => text,
      Err(_) => return future::ok(()),
    };

    match parse_client_frame(text) {
      ClientFrame::Publish(publish) => on_publish(&engine, connection, publish),
      ClientFrame::Subscribe(subscribe) => on_subscribe(&engine, connection, subscribe),
      ClientFrame::Unsubscribe(unsubscribe) => on_unsubscribe(&engine, connection, unsubscribe),
      ClientFrame::InvalidPublish => {
        notify(
          &engine,
          connection,
          "invalid event: missing or malformed fields".to_owned(),
        );
      }
      ClientFrame::Unknown => {
        debug!("ignoring unknown frame from {addr}");
      }
    }

    future::ok(())
  });

  let rx_to_client = async {
    let mut result: Result<(), tokio_tungstenite::tungstenite::Error> = Ok(());

    while let Some(msg) = rx.recv().await {
      if let Err(err) = outgoing.send(msg).await {
        error!("Error sending to {addr}: {err}");
        result = Err(err);
        break;
      }
    }

    result
  };

  // This has to be done in order to:
  // - pin the future in the heap (Box::pin)
  // - be able to compose the vec in `select_all` (all will have the same "Box" type)
  let boxed_broadcast_incoming = broadcast_incoming.boxed();
  let ping = ping.boxed();
  let rx_to_client = rx_to_client.boxed();

  let (_, _, _) = future::select_all(vec![boxed_broadcast_incoming, ping, rx_to_client]).await;

  // One of the futures above finished, so the connection is closed for
  // some reason. Drop its subscriptions and outbound queue.
  connection_cleanup(&engine, connection, addr);
}

#[derive(Debug, thiserror::Error)]
pub enum MainError {
  #[error(transparent)]
  Io(#[from] IoError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Keys(#[from] SchnorrError),
}

#[tokio::main]
pub async fn initiate_relay() -> Result<(), MainError> {
  let settings = Settings::from_env();

  let store = Arc::new(EventStore::new(settings.db_name.clone())?);
  let engine = Arc::new(RelayEngine::new(store));

  let keys = match settings.secret_key.as_deref() {
    Some(seckey) => schnorr::keys_from_hex(seckey)?,
    None => schnorr::generate_keys(),
  };
  let bridge = Arc::new(PublisherBridge::new(Arc::clone(&engine), keys));
  info!("relay identity: {}", bridge.relay_pubkey());

  if let Some(mirror_settings) = settings.mirror.clone() {
    let mirror_bridge = Arc::clone(&bridge);
    tokio::spawn(async move {
      run_mirror(mirror_settings, mirror_bridge).await;
    });
  }

  // Create the event loop and TCP listener we'll accept connections on.
  let listener = TcpListener::bind(&settings.host).await?;
  info!("Listening on: {}", settings.host);

  // Handle CTRL+C signal
  let ctrl_c_engine = Arc::clone(&engine);
  let ctrl_c_listener = async move {
    if tokio::signal::ctrl_c().await.is_err() {
      return;
    }
    ctrl_c_engine.close_all(format!("Server {} closing connection...", settings.host));
    info!("Ctrl-C received, shutting down");
  };

  // Spin up the server
  let server = async {
    while let Ok((stream, addr)) = listener.accept().await {
      // Spawn the handler to run async
      tokio::spawn(handle_connection(stream, addr, Arc::clone(&engine)));
    }
  };

  // Pinning the futures is necessary for using `select!`
  pin_mut!(server, ctrl_c_listener);
  // Whichever returns first, will end the server
  future::select(server, ctrl_c_listener).await;

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::net::{IpAddr, Ipv4Addr};

  use super::*;
  use crate::event::Event;
  use crate::filter::Filter;

  #[cfg(test)]
  use pretty_assertions::assert_eq;
  use serde_json::json;

  #[test]
  fn parse_unsubscribe_frame() {
    let unsubscribe = UnsubscribeMessage::new_unsubscribe(String::from("notes"));

    let result = parse_client_frame(&unsubscribe.as_json());

    assert_eq!(result, ClientFrame::Unsubscribe(unsubscribe));
  }

  #[test]
  fn parse_subscribe_frame() {
    let subscribe = SubscribeMessage::new_subscribe(String::from("notes"), vec![Filter::default()]);

    let result = parse_client_frame(&subscribe.as_json());

    assert_eq!(result, ClientFrame::Subscribe(subscribe));
  }

  #[test]
  fn parse_publish_frame() {
    let publish = PublishMessage::new_publish(Event::default());

    let result = parse_client_frame(&publish.as_json());

    assert_eq!(result, ClientFrame::Publish(publish));
  }

  #[test]
  fn publish_frames_with_broken_events_are_flagged_for_feedback() {
    let frame = json!(["EVENT", { "id": "only-an-id" }]).to_string();

    let result = parse_client_frame(&frame);

    assert_eq!(result, ClientFrame::InvalidPublish);
  }

  #[test]
  fn unparseable_frames_are_unknown() {
    assert_eq!(parse_client_frame("{}"), ClientFrame::Unknown);
    assert_eq!(parse_client_frame("not json at all"), ClientFrame::Unknown);
    assert_eq!(
      parse_client_frame(&json!(["AUTH", "challenge"]).to_string()),
      ClientFrame::Unknown
    );
  }

  #[tokio::test]
  async fn connection_cleanup_detaches_the_connection() {
    let store = Arc::new(EventStore::new(Some(String::from("relay_cleanup_test"))).unwrap());
    let engine = Arc::new(RelayEngine::new(store));
    let (connection, mut rx) = engine.attach();
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

    connection_cleanup(&engine, connection, addr);

    assert!(engine.sender(connection).is_none());
    assert!(rx.recv().await.is_none());

    let _ = fs::remove_file("db/relay_cleanup_test.redb");
  }
}
