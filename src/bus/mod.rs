// Durable signal bus on Redis streams: per-symbol append-only logs with
// consumer-group delivery.
pub mod consumer;
pub mod producer;

pub use consumer::{Delivery, GroupConsumer};
pub use producer::{PublishOutcome, SignalProducer};

/// Per-symbol intent log.
pub fn signal_stream(symbol: &str) -> String {
    format!("signals:{symbol}")
}

/// Per-symbol fill log, written by executors and read by the generator.
pub fn fill_stream(symbol: &str) -> String {
    format!("fills:{symbol}")
}

/// Single field under which event JSON rides in a stream entry.
pub const PAYLOAD_FIELD: &str = "payload";

/// Bounded retry for transient bus errors: re-evaluates the operation with
/// doubling delays, then surfaces the last error.
macro_rules! with_backoff {
    ($op:expr, $attempt:expr) => {{
        let mut delay_ms = 200u64;
        let mut tries = 0u32;
        loop {
            match $attempt.await {
                Ok(v) => break Ok(v),
                Err(e) if tries < 4 => {
                    tries += 1;
                    tracing::warn!("{} failed ({}), retry {}/4 in {}ms", $op, e, tries, delay_ms);
                    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(3_000);
                }
                Err(e) => break Err(e),
            }
        }
    }};
}
pub(crate) use with_backoff;
