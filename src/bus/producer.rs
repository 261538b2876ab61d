use redis::aio::ConnectionManager;
use redis::Client;
use tokio::time::{timeout, Duration};

use crate::bus::{signal_stream, with_backoff, PAYLOAD_FIELD};
use crate::models::{FillEvent, IntentEvent};
use crate::Result;

/// Accepted dedupe window: a second intent with the same key inside it is
/// swallowed as success.
const DEDUPE_WINDOW_SECS: u64 = 300;

/// Stream collecting fills the reconciler refused to apply, for the operator.
const QUARANTINE_STREAM: &str = "quarantine";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Durably appended under this stream id.
    Appended(String),
    /// Dedupe hit inside the window; no second entry was written.
    Duplicate,
}

/// Appends intent events to the per-symbol signal log. The write is durable
/// once XADD returns an id.
pub struct SignalProducer {
    conn: ConnectionManager,
}

impl SignalProducer {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Publish one intent. Duplicate dedupe keys inside the sliding window
    /// return `Duplicate` without appending.
    pub async fn publish(&mut self, intent: &IntentEvent) -> Result<PublishOutcome> {
        let dedupe_key = format!("dedupe:{}:{}", intent.symbol, intent.dedupe_key);
        let claimed: Option<String> = with_backoff!(
            "dedupe SET",
            redis::cmd("SET")
                .arg(&dedupe_key)
                .arg(intent.event_id.to_string())
                .arg("NX")
                .arg("EX")
                .arg(DEDUPE_WINDOW_SECS)
                .query_async(&mut self.conn)
        )?;
        if claimed.is_none() {
            tracing::debug!(
                "[{}] duplicate {} intent dropped (key {})",
                intent.symbol,
                intent.action.name(),
                intent.dedupe_key
            );
            return Ok(PublishOutcome::Duplicate);
        }

        let payload = serde_json::to_string(intent)?;
        let stream = signal_stream(&intent.symbol);
        let id: String = with_backoff!(
            "signal XADD",
            redis::cmd("XADD")
                .arg(&stream)
                .arg("*")
                .arg(PAYLOAD_FIELD)
                .arg(&payload)
                .query_async(&mut self.conn)
        )?;
        tracing::debug!("[{}] intent {} appended as {}", intent.symbol, intent.event_id, id);
        Ok(PublishOutcome::Appended(id))
    }

    /// Park a fill the reconciler could not apply where the operator can
    /// inspect it.
    pub async fn quarantine(&mut self, fill: &FillEvent, reason: &str) -> Result<()> {
        let payload = serde_json::to_string(fill)?;
        let _: String = with_backoff!(
            "quarantine XADD",
            redis::cmd("XADD")
                .arg(QUARANTINE_STREAM)
                .arg("*")
                .arg("reason")
                .arg(reason)
                .arg(PAYLOAD_FIELD)
                .arg(&payload)
                .query_async(&mut self.conn)
        )?;
        Ok(())
    }
}
