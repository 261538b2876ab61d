use chrono::DateTime;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::counters::bump;
use crate::models::Tick;
use crate::runtime::dispatcher::TickDispatcher;

/// Stream the market-data bridge appends ticks to.
const TICK_STREAM: &str = "ticks";

/// Tail the tick stream and push everything through the dispatcher. Plain
/// XREAD (no group): market data is fan-in, not work-sharing, and replaying
/// old ticks after a restart would be wrong.
pub async fn run(
    mut conn: ConnectionManager,
    mut dispatcher: TickDispatcher,
    shutdown: watch::Receiver<bool>,
) {
    let mut last_id = "$".to_string();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let opts = StreamReadOptions::default().count(128).block(1000);
        let reply: StreamReadReply = match conn
            .xread_options(&[TICK_STREAM], &[last_id.as_str()], &opts)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("tick feed read failed: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        for key in reply.keys {
            for entry in key.ids {
                last_id = entry.id.clone();
                let symbol: Option<String> = entry.get("symbol");
                let price: Option<f64> = entry.get("price");
                let ts_ms: Option<i64> = entry.get("ts");

                let tick = match (symbol, price, ts_ms) {
                    (Some(symbol), Some(price), Some(ts_ms)) => {
                        match DateTime::from_timestamp_millis(ts_ms) {
                            Some(ts) => Tick { symbol, price, ts },
                            None => {
                                bump(&dispatcher.counters().bad_ticks);
                                tracing::debug!("dropped tick {} with bad ts {}", entry.id, ts_ms);
                                continue;
                            }
                        }
                    }
                    _ => {
                        bump(&dispatcher.counters().bad_ticks);
                        tracing::debug!("dropped malformed tick entry {}", entry.id);
                        continue;
                    }
                };
                dispatcher.dispatch_tick(tick).await;
            }
        }
    }
    tracing::info!("tick feed stopped");
}
