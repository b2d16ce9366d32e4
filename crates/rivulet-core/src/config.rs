use std::env;
use std::time::Duration;

/// How often the mirroring poller contacts the upstream feed when
/// `MIRROR_INTERVAL_SECS` is not set.
const DEFAULT_MIRROR_INTERVAL_SECS: u64 = 60;

/// Upstream feed the mirroring poller republishes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
  pub url: String,
  pub interval: Duration,
}

///
/// Process configuration, read once at startup from the environment
/// (`.env` is loaded by the binary before this runs):
///
/// - `RELAY_HOST`: listen address, default `0.0.0.0:8080`
/// - `RELAY_DB`: name of the event store database file
/// - `RELAY_SECRET_KEY`: hex secret key of the relay's own identity;
///   a fresh one is generated per process when absent
/// - `MIRROR_URL`: upstream feed address; mirroring is off when absent
/// - `MIRROR_INTERVAL_SECS`: polling cadence for the mirror
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub host: String,
  pub db_name: Option<String>,
  pub secret_key: Option<String>,
  pub mirror: Option<MirrorSettings>,
}

impl Settings {
  pub fn from_env() -> Self {
    let host = env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_name = env::var("RELAY_DB").ok();
    let secret_key = env::var("RELAY_SECRET_KEY").ok();

    let mirror = env::var("MIRROR_URL").ok().map(|url| {
      let interval_secs = env::var("MIRROR_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MIRROR_INTERVAL_SECS);
      MirrorSettings {
        url,
        interval: Duration::from_secs(interval_secs),
      }
    });

    Self {
      host,
      db_name,
      secret_key,
      mirror,
    }
  }
}
