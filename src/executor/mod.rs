// Executor role: consume one symbol's intent stream in a consumer group,
// drive the broker, report fills.
pub mod broker;

pub use broker::{Broker, BrokerError, BrokerFill, PaperBroker};

use chrono::Utc;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use crate::bus::{fill_stream, signal_stream, with_backoff, Delivery, GroupConsumer, PAYLOAD_FIELD};
use crate::config::Config;
use crate::models::{FillEvent, FillStatus, IntentEvent};
use crate::Result;

/// How long a processed-event marker lives. Replays older than this are
/// assumed impossible (the dedupe window is minutes, not days).
const PROCESSED_TTL_SECS: u64 = 86_400;

/// One executor worker: claims intents for a symbol, executes them against
/// the broker idempotently, acknowledges, and publishes fills.
///
/// Acknowledgement policy: success and business rejection both ack (the
/// decision is resolved either way); transient broker failure leaves the
/// entry pending so it is re-claimed after the idle threshold.
pub struct ExecutorService<B: Broker> {
    consumer: GroupConsumer,
    conn: ConnectionManager,
    symbol: String,
    group: String,
    broker: B,
    claim_interval: Duration,
    min_idle_ms: usize,
}

impl<B: Broker> ExecutorService<B> {
    pub async fn start(
        conn: ConnectionManager,
        cfg: &Config,
        symbol: impl Into<String>,
        group: impl Into<String>,
        consumer_name: impl Into<String>,
        broker: B,
    ) -> Result<Self> {
        let symbol = symbol.into();
        let group = group.into();
        let consumer = GroupConsumer::with_connection(
            conn.clone(),
            signal_stream(&symbol),
            group.clone(),
            consumer_name.into(),
        )
        .await?;
        Ok(Self {
            consumer,
            conn,
            symbol,
            group,
            broker,
            claim_interval: Duration::from_secs(cfg.claim_interval_secs),
            min_idle_ms: (cfg.claim_idle_threshold_secs() * 1000) as usize,
        })
    }

    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        // Scan immediately so in-flight intents from a dead consumer are
        // picked up before new ones.
        let mut last_claim = Instant::now() - self.claim_interval;

        loop {
            if *shutdown.borrow() {
                break;
            }

            if last_claim.elapsed() >= self.claim_interval {
                last_claim = Instant::now();
                match self.consumer.claim_stale(self.min_idle_ms, 32).await {
                    Ok(deliveries) => {
                        for delivery in deliveries {
                            self.process(delivery).await;
                        }
                    }
                    Err(e) => tracing::warn!("[{}] pending scan failed: {}", self.symbol, e),
                }
            }

            match self.consumer.read_batch(16, 1000).await {
                Ok(batch) => {
                    for delivery in batch {
                        self.process(delivery).await;
                    }
                }
                Err(e) => {
                    tracing::warn!("[{}] intent read failed: {}", self.symbol, e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        tracing::info!("[{}] executor stopped", self.symbol);
    }

    async fn process(&mut self, delivery: Delivery) {
        let intent: IntentEvent = match serde_json::from_str(&delivery.payload) {
            Ok(intent) => intent,
            Err(e) => {
                // Malformed payloads are unrecoverable; ack so they do not
                // cycle through the pending list forever.
                tracing::warn!(
                    "[{}] dropped malformed intent {}: {}",
                    self.symbol,
                    delivery.id,
                    e
                );
                self.ack(&delivery.id).await;
                return;
            }
        };

        match self.already_processed(&intent).await {
            Ok(true) => {
                tracing::debug!(
                    "[{}] intent {} already executed, ack only",
                    self.symbol,
                    intent.event_id
                );
                self.ack(&delivery.id).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                // Cannot prove idempotency; leave pending and retry later.
                tracing::warn!("[{}] idempotency check failed: {}", self.symbol, e);
                return;
            }
        }

        match self.broker.execute(&intent).await {
            Ok(fill) => {
                if let Err(e) = self.mark_processed(&intent).await {
                    tracing::warn!("[{}] failed to mark {} processed: {}", self.symbol, intent.event_id, e);
                }
                match self.publish_fill(&intent, Some(&fill), FillStatus::Filled).await {
                    Ok(()) => self.ack(&delivery.id).await,
                    Err(e) => {
                        tracing::error!("[{}] fill publish failed: {}", self.symbol, e)
                    }
                }
            }
            Err(BrokerError::Rejected(reason)) => {
                tracing::warn!(
                    "[{}] {} rejected: {}",
                    self.symbol,
                    intent.action.name(),
                    reason
                );
                if let Err(e) = self.mark_processed(&intent).await {
                    tracing::warn!("[{}] failed to mark {} processed: {}", self.symbol, intent.event_id, e);
                }
                match self.publish_fill(&intent, None, FillStatus::Rejected).await {
                    Ok(()) => self.ack(&delivery.id).await,
                    Err(e) => {
                        tracing::error!("[{}] reject publish failed: {}", self.symbol, e)
                    }
                }
            }
            Err(BrokerError::Transient(reason)) => {
                tracing::warn!(
                    "[{}] transient broker failure on {}: {} (left pending)",
                    self.symbol,
                    intent.event_id,
                    reason
                );
            }
        }
    }

    fn processed_key(&self, intent: &IntentEvent) -> String {
        format!("processed:{}:{}", self.group, intent.event_id)
    }

    async fn already_processed(&mut self, intent: &IntentEvent) -> Result<bool> {
        let key = self.processed_key(intent);
        let exists: bool = with_backoff!(
            "processed EXISTS",
            redis::cmd("EXISTS").arg(&key).query_async(&mut self.conn)
        )?;
        Ok(exists)
    }

    async fn mark_processed(&mut self, intent: &IntentEvent) -> Result<()> {
        let key = self.processed_key(intent);
        let _: () = with_backoff!(
            "processed SET",
            redis::cmd("SET")
                .arg(&key)
                .arg(1)
                .arg("EX")
                .arg(PROCESSED_TTL_SECS)
                .query_async(&mut self.conn)
        )?;
        Ok(())
    }

    async fn publish_fill(
        &mut self,
        intent: &IntentEvent,
        fill: Option<&BrokerFill>,
        status: FillStatus,
    ) -> Result<()> {
        let event = FillEvent {
            event_id: Uuid::new_v4(),
            intent_id: intent.event_id,
            symbol: intent.symbol.clone(),
            lot_id: fill.and_then(|f| f.lot_id),
            fill_price: fill.map(|f| f.fill_price).unwrap_or(0.0),
            filled_size: fill.map(|f| f.filled_size).unwrap_or(0.0),
            ts: Utc::now(),
            status,
        };
        let payload = serde_json::to_string(&event)?;
        let stream = fill_stream(&intent.symbol);
        let _: String = with_backoff!(
            "fill XADD",
            redis::cmd("XADD")
                .arg(&stream)
                .arg("*")
                .arg(PAYLOAD_FIELD)
                .arg(&payload)
                .query_async(&mut self.conn)
        )?;
        Ok(())
    }

    async fn ack(&mut self, id: &str) {
        if let Err(e) = self.consumer.ack(id).await {
            tracing::warn!("[{}] ack of {} failed: {}", self.symbol, id, e);
        }
    }
}
