use chrono::{DateTime, TimeZone, Utc};

use crate::models::Candle;

/// Folds ticks into fixed-period OHLC candles for one symbol.
///
/// Holds at most one open candle. A tick past the current bucket closes the
/// candle; minutes with no ticks are propagated as flat candles at the
/// previous close so the indicator ring never skips a bucket.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    symbol: String,
    period_secs: i64,
    open: Option<Candle>,
}

impl CandleAggregator {
    pub fn new(symbol: impl Into<String>, period_secs: u64) -> Self {
        Self {
            symbol: symbol.into(),
            period_secs: period_secs as i64,
            open: None,
        }
    }

    fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp().div_euclid(self.period_secs) * self.period_secs;
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn fresh(&self, bucket: DateTime<Utc>, price: f64) -> Candle {
        Candle {
            symbol: self.symbol.clone(),
            bucket_start: bucket,
            open: price,
            high: price,
            low: price,
            close: price,
            n_ticks: 1,
        }
    }

    /// Apply a tick; returns candles closed by it, oldest first.
    pub fn update(&mut self, price: f64, ts: DateTime<Utc>) -> Vec<Candle> {
        let bucket = self.bucket_start(ts);

        let current = match self.open.as_mut() {
            None => {
                self.open = Some(self.fresh(bucket, price));
                return Vec::new();
            }
            Some(c) => c,
        };

        if bucket == current.bucket_start {
            current.high = current.high.max(price);
            current.low = current.low.min(price);
            current.close = price;
            current.n_ticks += 1;
            return Vec::new();
        }

        if bucket < current.bucket_start {
            // The dispatcher enforces per-symbol monotonic ts; anything that
            // still lands here is ignored rather than rewriting history.
            return Vec::new();
        }

        let closed_first = self.open.take().unwrap();
        let prev_close = closed_first.close;
        let mut closed = vec![closed_first];

        // Flat candles for skipped minutes.
        let mut cursor = closed[0].bucket_start + chrono::Duration::seconds(self.period_secs);
        while cursor < bucket {
            closed.push(Candle {
                symbol: self.symbol.clone(),
                bucket_start: cursor,
                open: prev_close,
                high: prev_close,
                low: prev_close,
                close: prev_close,
                n_ticks: 0,
            });
            cursor += chrono::Duration::seconds(self.period_secs);
        }

        self.open = Some(self.fresh(bucket, price));
        closed
    }

    /// The candle currently being built, if any.
    pub fn open_candle(&self) -> Option<&Candle> {
        self.open.as_ref()
    }
}
