use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::book::PositionBook;
use crate::config::Config;
use crate::counters::{bump, Counters};
use crate::market::{CandleAggregator, IndicatorCache};
use crate::models::{FillEvent, FillStatus, IntentAction, IntentEvent, Lot, Stage};
use crate::persistence::SymbolSnapshot;
use crate::strategy::{evaluate, CooldownKind, CooldownRegistry, EvalContext};

/// Intents kept around so late fills can still resolve their originating
/// action after the pending slot was released.
const RECENT_INTENTS_CAP: usize = 64;

/// Outcome of applying one fill to the book.
#[derive(Debug, Clone, PartialEq)]
pub enum FillResult {
    /// Entry fill appended a lot.
    Opened(Uuid),
    /// Exit fill removed these lots.
    Closed(Vec<Uuid>),
    /// Broker rejected the order; pending cleared, book untouched.
    Rejected,
    /// Nothing left to do (replayed or already-resolved fill).
    NoOp,
    /// The fill could not be applied without breaking a book invariant, or
    /// its intent is unknown. The caller ships it to the quarantine stream.
    Quarantined(String),
}

/// Single-writer decision core for one symbol: candle aggregation, indicator
/// maintenance, the position book, cooldowns and the evaluator, advanced by
/// exactly one lane. All methods are synchronous and deterministic; every
/// timestamp comes from the event being processed.
pub struct SymbolEngine {
    symbol: String,
    cfg: Arc<Config>,
    counters: Arc<Counters>,
    candles: CandleAggregator,
    indicators: IndicatorCache,
    book: PositionBook,
    cooldowns: CooldownRegistry,
    recent_intents: HashMap<Uuid, IntentEvent>,
    intent_order: VecDeque<Uuid>,
}

impl SymbolEngine {
    pub fn new(symbol: impl Into<String>, cfg: Arc<Config>, counters: Arc<Counters>) -> Self {
        let symbol = symbol.into();
        Self {
            candles: CandleAggregator::new(symbol.clone(), cfg.candle_period_secs),
            indicators: IndicatorCache::new(cfg.ma_period, cfg.momentum_window),
            book: PositionBook::new(symbol.clone(), cfg.max_lots),
            cooldowns: CooldownRegistry::new(),
            recent_intents: HashMap::new(),
            intent_order: VecDeque::new(),
            symbol,
            cfg,
            counters,
        }
    }

    /// Rebuild from a snapshot taken by a previous run.
    pub fn restore(cfg: Arc<Config>, counters: Arc<Counters>, snapshot: SymbolSnapshot) -> Self {
        let symbol = snapshot.symbol;
        Self {
            candles: CandleAggregator::new(symbol.clone(), cfg.candle_period_secs),
            indicators: IndicatorCache::from_closes(
                cfg.ma_period,
                cfg.momentum_window,
                &snapshot.closes,
            ),
            book: PositionBook::from_lots(symbol.clone(), cfg.max_lots, snapshot.lots),
            cooldowns: snapshot.cooldowns,
            recent_intents: HashMap::new(),
            intent_order: VecDeque::new(),
            symbol,
            cfg,
            counters,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    pub fn snapshot(&self) -> SymbolSnapshot {
        SymbolSnapshot {
            symbol: self.symbol.clone(),
            closes: self.indicators.closes(),
            lots: self.book.iter().cloned().collect(),
            cooldowns: self.cooldowns.clone(),
            taken_at: Utc::now(),
        }
    }

    /// Advance the pipeline by one tick: roll candles, refresh indicators,
    /// evaluate. Returns the intent to publish, if any.
    pub fn on_tick(&mut self, price: f64, ts: DateTime<Utc>) -> Option<IntentEvent> {
        if let Some(stale) = self
            .cooldowns
            .expire_pending(ts, self.cfg.intent_pending_timeout_secs)
        {
            bump(&self.counters.intent_timeouts);
            tracing::warn!(
                "[{}] intent {} pending past {}s, released for re-proposal",
                self.symbol,
                stale,
                self.cfg.intent_pending_timeout_secs
            );
        }

        for candle in self.candles.update(price, ts) {
            self.indicators.on_close(&candle);
        }

        if self.cooldowns.pending().is_some() {
            return None;
        }
        let indicators = self.indicators.snapshot()?;

        let decision = evaluate(&EvalContext {
            price,
            indicators,
            book: &self.book,
            cooldowns: &self.cooldowns,
            cfg: &self.cfg,
            now: ts,
        })?;

        let dedupe_key =
            IntentEvent::dedupe_key_for(&self.symbol, &decision.action, self.book.len(), ts);
        let event = IntentEvent {
            event_id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            action: decision.action,
            direction: decision.direction,
            reference_price: price,
            ts,
            book_size: self.book.len(),
            ma_thr: self.cfg.ma_thr_eff,
            dedupe_key,
        };

        self.cooldowns.set_pending(event.event_id, ts);
        self.remember(event.clone());

        tracing::info!(
            "[{}] {} {} @ {:.5} (book={}, ma={:.5}, mom={:.5})",
            self.symbol,
            event.action.name(),
            event.direction,
            price,
            event.book_size,
            indicators.ma,
            indicators.momentum,
        );
        Some(event)
    }

    /// Apply one executor fill to the book and cooldowns.
    pub fn apply_fill(&mut self, fill: &FillEvent) -> FillResult {
        let Some(intent) = self.recent_intents.get(&fill.intent_id).cloned() else {
            bump(&self.counters.quarantined_fills);
            return FillResult::Quarantined(format!(
                "fill {} references unknown intent {}",
                fill.event_id, fill.intent_id
            ));
        };

        self.cooldowns.clear_pending(fill.intent_id);

        if fill.status == FillStatus::Rejected {
            tracing::info!(
                "[{}] {} rejected by broker, book unchanged",
                self.symbol,
                intent.action.name()
            );
            return FillResult::Rejected;
        }

        if intent.action.opens_lot() {
            self.open_lot(&intent, fill)
        } else {
            self.close_lots(&intent, fill)
        }
    }

    fn open_lot(&mut self, intent: &IntentEvent, fill: &FillEvent) -> FillResult {
        let stage = match intent.action {
            IntentAction::Init => Stage::Init,
            IntentAction::Init2 { .. } => Stage::Init2,
            IntentAction::Init3 { .. } => Stage::Init3,
            IntentAction::ScaleIn => Stage::ScaleIn(self.book.len() as u32 + 1),
            _ => unreachable!("opens_lot covers entry actions only"),
        };
        let lot = Lot {
            id: fill.lot_id.unwrap_or_else(Uuid::new_v4),
            symbol: self.symbol.clone(),
            direction: intent.direction,
            entry_price: fill.fill_price,
            entry_ts: fill.ts,
            size: fill.filled_size,
            stage,
            ma_thr_at_entry: intent.ma_thr,
        };
        let lot_id = lot.id;

        match self.book.append(lot) {
            Ok(()) => {
                if intent.action == IntentAction::ScaleIn {
                    self.cooldowns.arm(
                        CooldownKind::ScaleIn,
                        fill.ts,
                        self.cfg.scale_in_cooldown_secs,
                    );
                }
                tracing::info!(
                    "[{}] lot {} opened {} @ {:.5} ({:?}, book={})",
                    self.symbol,
                    lot_id,
                    intent.direction,
                    fill.fill_price,
                    stage,
                    self.book.len()
                );
                FillResult::Opened(lot_id)
            }
            Err(e) => {
                bump(&self.counters.quarantined_fills);
                FillResult::Quarantined(format!("fill {}: {}", fill.event_id, e))
            }
        }
    }

    fn close_lots(&mut self, intent: &IntentEvent, fill: &FillEvent) -> FillResult {
        let closed: Vec<Lot> = match &intent.action {
            IntentAction::StopLoss { target_lot } | IntentAction::TakeProfit { target_lot } => {
                self.book.close_lot(*target_lot).into_iter().collect()
            }
            IntentAction::NormalExit { .. } => self.book.close_all(),
            IntentAction::RiskControl { close_all, .. } => {
                if *close_all {
                    self.book.close_all()
                } else {
                    self.book.close_oldest_n(1)
                }
            }
            IntentAction::ScaleOut { .. } => self.book.close_newest().into_iter().collect(),
            IntentAction::NearTouch { .. } | IntentAction::InitOut { .. } => {
                self.book.close_newest().into_iter().collect()
            }
            _ => unreachable!("close_lots covers exit actions only"),
        };

        if closed.is_empty() {
            tracing::debug!(
                "[{}] {} fill {} had nothing left to close",
                self.symbol,
                intent.action.name(),
                fill.event_id
            );
            return FillResult::NoOp;
        }

        if matches!(intent.action, IntentAction::ScaleOut { .. }) {
            self.cooldowns.arm(
                CooldownKind::ScaleOut,
                fill.ts,
                self.cfg.scaleout_cooldown_secs,
            );
        }

        let ids: Vec<Uuid> = closed.iter().map(|l| l.id).collect();
        tracing::info!(
            "[{}] {} closed {} lot(s) @ {:.5} (book={})",
            self.symbol,
            intent.action.name(),
            ids.len(),
            fill.fill_price,
            self.book.len()
        );
        FillResult::Closed(ids)
    }

    fn remember(&mut self, event: IntentEvent) {
        self.intent_order.push_back(event.event_id);
        self.recent_intents.insert(event.event_id, event);
        while self.intent_order.len() > RECENT_INTENTS_CAP {
            if let Some(old) = self.intent_order.pop_front() {
                self.recent_intents.remove(&old);
            }
        }
    }
}
