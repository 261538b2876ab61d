use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single price tick from the market feed.
///
/// The feed contract delivers `(symbol, price, epoch ms)`; timestamps are
/// converted to `DateTime<Utc>` at the boundary. Per-symbol `ts` must be
/// monotonic; the dispatcher drops violations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub ts: DateTime<Utc>,
}

/// One-minute OHLC candle. Closed when a tick at or past
/// `bucket_start + candle_period` arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub bucket_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub n_ticks: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Entry stage of a lot. `ScaleIn(k)` is the k-th entry in the book at the
/// time the scale-in filled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stage {
    Init,
    Init2,
    Init3,
    ScaleIn(u32),
}

impl Stage {
    pub fn is_init(&self) -> bool {
        matches!(self, Stage::Init)
    }
}

/// A single filled entry within the position book. Immutable after creation;
/// `ma_thr_at_entry` is frozen at the threshold in force when the originating
/// intent was emitted, so later threshold changes do not move SL/TP targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_ts: DateTime<Utc>,
    pub size: f64,
    pub stage: Stage,
    pub ma_thr_at_entry: f64,
}

impl Lot {
    /// Seconds held as of `now`. Clock skew clamps to zero.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_ts).num_seconds().max(0)
    }
}

/// The eleven strategy decisions, with per-variant targets so the bus payload
/// is self-describing rather than stringly typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum IntentAction {
    Init,
    Init2 { anchor_lot: Uuid },
    Init3 { anchor_lot: Uuid },
    ScaleIn,
    StopLoss { target_lot: Uuid },
    TakeProfit { target_lot: Uuid },
    NormalExit { target_lots: Vec<Uuid> },
    RiskControl { target_lots: Vec<Uuid>, close_all: bool },
    ScaleOut { target_lot: Uuid },
    InitOut { target_lot: Uuid },
    NearTouch { target_lot: Uuid },
}

impl IntentAction {
    /// Stable wire name, also the action component of the dedupe key.
    pub fn name(&self) -> &'static str {
        match self {
            IntentAction::Init => "INIT",
            IntentAction::Init2 { .. } => "INIT2",
            IntentAction::Init3 { .. } => "INIT3",
            IntentAction::ScaleIn => "SCALE_IN",
            IntentAction::StopLoss { .. } => "STOP_LOSS",
            IntentAction::TakeProfit { .. } => "TAKE_PROFIT",
            IntentAction::NormalExit { .. } => "NORMAL_EXIT",
            IntentAction::RiskControl { .. } => "RISK_CONTROL",
            IntentAction::ScaleOut { .. } => "SCALE_OUT",
            IntentAction::InitOut { .. } => "INIT_OUT",
            IntentAction::NearTouch { .. } => "NEAR_TOUCH",
        }
    }

    /// True for actions that create a new lot when filled.
    pub fn opens_lot(&self) -> bool {
        matches!(
            self,
            IntentAction::Init
                | IntentAction::Init2 { .. }
                | IntentAction::Init3 { .. }
                | IntentAction::ScaleIn
        )
    }

    /// The lot the dedupe key anchors to, if the action has one.
    pub fn anchor(&self) -> Option<Uuid> {
        match self {
            IntentAction::Init | IntentAction::ScaleIn => None,
            IntentAction::Init2 { anchor_lot } | IntentAction::Init3 { anchor_lot } => {
                Some(*anchor_lot)
            }
            IntentAction::StopLoss { target_lot }
            | IntentAction::TakeProfit { target_lot }
            | IntentAction::ScaleOut { target_lot }
            | IntentAction::InitOut { target_lot }
            | IntentAction::NearTouch { target_lot } => Some(*target_lot),
            IntentAction::NormalExit { target_lots }
            | IntentAction::RiskControl { target_lots, .. } => target_lots.first().copied(),
        }
    }
}

/// Intent event published on the signal stream. At most one per symbol per
/// tick. `ma_thr` freezes the threshold for the lot the fill will create;
/// `book_size` is the book size at emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEvent {
    pub event_id: Uuid,
    pub symbol: String,
    pub action: IntentAction,
    pub direction: Direction,
    pub reference_price: f64,
    pub ts: DateTime<Utc>,
    pub book_size: usize,
    pub ma_thr: f64,
    pub dedupe_key: String,
}

impl IntentEvent {
    /// Fingerprint of the logical decision: same symbol, action, book size
    /// and minute (plus anchor lot) hash to the same key, so a repeated
    /// evaluation within the dedupe window cannot produce two orders.
    pub fn dedupe_key_for(
        symbol: &str,
        action: &IntentAction,
        book_size: usize,
        ts: DateTime<Utc>,
    ) -> String {
        let minute = ts.timestamp() / 60;
        let anchor = action
            .anchor()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{}:{}:{}:{}:{}", symbol, action.name(), book_size, minute, anchor)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FillStatus {
    #[serde(rename = "FILLED")]
    Filled,
    #[serde(rename = "PARTIAL")]
    Partial,
    #[serde(rename = "REJECTED")]
    Rejected,
}

/// Fill report published by executors on the fill stream. `intent_id` links
/// back to the originating intent; `lot_id` is set for entry fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillEvent {
    pub event_id: Uuid,
    pub intent_id: Uuid,
    pub symbol: String,
    pub lot_id: Option<Uuid>,
    pub fill_price: f64,
    pub filled_size: f64,
    pub ts: DateTime<Utc>,
    pub status: FillStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_key_stable_within_minute() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_020, 0).unwrap();
        let later = DateTime::<Utc>::from_timestamp(1_700_000_040, 0).unwrap();
        let a = IntentEvent::dedupe_key_for("BTCUSD", &IntentAction::ScaleIn, 2, ts);
        let b = IntentEvent::dedupe_key_for("BTCUSD", &IntentAction::ScaleIn, 2, later);
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedupe_key_differs_across_minutes_and_sizes() {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_020, 0).unwrap();
        let next_minute = DateTime::<Utc>::from_timestamp(1_700_000_080, 0).unwrap();
        let a = IntentEvent::dedupe_key_for("BTCUSD", &IntentAction::ScaleIn, 2, ts);
        assert_ne!(
            a,
            IntentEvent::dedupe_key_for("BTCUSD", &IntentAction::ScaleIn, 2, next_minute)
        );
        assert_ne!(
            a,
            IntentEvent::dedupe_key_for("BTCUSD", &IntentAction::ScaleIn, 3, ts)
        );
    }

    #[test]
    fn test_intent_action_roundtrip() {
        let action = IntentAction::StopLoss {
            target_lot: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: IntentAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }

    #[test]
    fn test_opens_lot() {
        assert!(IntentAction::Init.opens_lot());
        assert!(IntentAction::ScaleIn.opens_lot());
        assert!(!IntentAction::NormalExit { target_lots: vec![] }.opens_lot());
    }
}
