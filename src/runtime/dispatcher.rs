use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::counters::{bump, Counters};
use crate::error::FeedError;
use crate::models::{FillEvent, Tick};
use crate::runtime::lane::LaneEvent;

/// Routes market data onto the per-symbol lanes, enforcing the feed
/// contract: finite positive prices, known symbols, per-symbol monotonic
/// timestamps. Violations are dropped with a counter increment.
pub struct TickDispatcher {
    lanes: HashMap<String, mpsc::Sender<LaneEvent>>,
    last_ts: HashMap<String, DateTime<Utc>>,
    counters: Arc<Counters>,
}

impl TickDispatcher {
    pub fn new(lanes: HashMap<String, mpsc::Sender<LaneEvent>>, counters: Arc<Counters>) -> Self {
        Self {
            lanes,
            last_ts: HashMap::new(),
            counters,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    fn check(&self, tick: &Tick) -> Result<(), FeedError> {
        if !tick.price.is_finite() || tick.price <= 0.0 {
            return Err(FeedError::BadInput(format!(
                "{}: price {}",
                tick.symbol, tick.price
            )));
        }
        if !self.lanes.contains_key(&tick.symbol) {
            return Err(FeedError::BadInput(format!("unknown symbol {}", tick.symbol)));
        }
        if let Some(last) = self.last_ts.get(&tick.symbol) {
            if tick.ts < *last {
                return Err(FeedError::StaleTick {
                    symbol: tick.symbol.clone(),
                    ts: tick.ts.timestamp_millis(),
                    last: last.timestamp_millis(),
                });
            }
        }
        Ok(())
    }

    pub async fn dispatch_tick(&mut self, tick: Tick) {
        match self.check(&tick) {
            Ok(()) => {}
            Err(e @ FeedError::BadInput(_)) => {
                bump(&self.counters.bad_ticks);
                tracing::debug!("dropped tick: {}", e);
                return;
            }
            Err(e @ FeedError::StaleTick { .. }) => {
                bump(&self.counters.stale_ticks);
                tracing::debug!("dropped tick: {}", e);
                return;
            }
        }
        self.last_ts.insert(tick.symbol.clone(), tick.ts);

        let tx = &self.lanes[&tick.symbol];
        if tx.send(LaneEvent::Tick(tick)).await.is_err() {
            tracing::warn!("lane closed, tick dropped");
        }
    }

    /// Route a reconciled fill onto its symbol's lane so it is applied
    /// before the next tick.
    pub async fn dispatch_fill(&self, fill: FillEvent) {
        let Some(tx) = self.lanes.get(&fill.symbol) else {
            bump(&self.counters.bad_ticks);
            tracing::warn!("dropped fill for unknown symbol {}", fill.symbol);
            return;
        };
        if tx.send(LaneEvent::Fill(fill)).await.is_err() {
            tracing::warn!("lane closed, fill dropped");
        }
    }
}
