use thiserror::Error;
use uuid::Uuid;

use crate::models::{IntentAction, IntentEvent};

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Worth retrying: the entry is left unacked and re-claimed later.
    #[error("transient broker failure: {0}")]
    Transient(String),

    /// Business rejection: reported as a REJECTED fill and acknowledged.
    #[error("order rejected: {0}")]
    Rejected(String),
}

/// What the broker reports back for one executed intent.
#[derive(Debug, Clone)]
pub struct BrokerFill {
    /// Broker-assigned lot id for entries, `None` for exits.
    pub lot_id: Option<Uuid>,
    pub fill_price: f64,
    pub filled_size: f64,
}

/// Order sink seam. Real adapters (MT5 and friends) live outside this crate;
/// they key server-side idempotency on the intent's `event_id`.
pub trait Broker: Send {
    fn execute(
        &mut self,
        intent: &IntentEvent,
    ) -> impl std::future::Future<Output = Result<BrokerFill, BrokerError>> + Send;
}

/// Fills every order at the reference price. Stands in for a real adapter in
/// development and in tests.
#[derive(Debug, Clone)]
pub struct PaperBroker {
    lot_size: f64,
}

impl PaperBroker {
    pub fn new(lot_size: f64) -> Self {
        Self { lot_size }
    }
}

impl Broker for PaperBroker {
    async fn execute(&mut self, intent: &IntentEvent) -> Result<BrokerFill, BrokerError> {
        let lot_id = if intent.action.opens_lot() {
            Some(Uuid::new_v4())
        } else {
            None
        };
        tracing::info!(
            "[{}] paper {} {} @ {:.5}",
            intent.symbol,
            intent.action.name(),
            intent.direction,
            intent.reference_price
        );
        Ok(BrokerFill {
            lot_id,
            fill_price: intent.reference_price,
            filled_size: match &intent.action {
                IntentAction::NormalExit { target_lots }
                | IntentAction::RiskControl { target_lots, .. } => {
                    self.lot_size * target_lots.len() as f64
                }
                _ => self.lot_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;

    fn intent(action: IntentAction) -> IntentEvent {
        let ts = Utc::now();
        IntentEvent {
            event_id: Uuid::new_v4(),
            symbol: "BTCUSD".to_string(),
            dedupe_key: IntentEvent::dedupe_key_for("BTCUSD", &action, 1, ts),
            action,
            direction: Direction::Long,
            reference_price: 98.9,
            ts,
            book_size: 1,
            ma_thr: 0.01,
        }
    }

    #[tokio::test]
    async fn test_entry_fill_carries_lot_id() {
        let mut broker = PaperBroker::new(1.0);
        let fill = broker.execute(&intent(IntentAction::Init)).await.unwrap();
        assert!(fill.lot_id.is_some());
        assert_eq!(fill.fill_price, 98.9);
        assert_eq!(fill.filled_size, 1.0);
    }

    #[tokio::test]
    async fn test_exit_fill_has_no_lot_id() {
        let mut broker = PaperBroker::new(1.0);
        let fill = broker
            .execute(&intent(IntentAction::NormalExit {
                target_lots: vec![Uuid::new_v4(), Uuid::new_v4()],
            }))
            .await
            .unwrap();
        assert!(fill.lot_id.is_none());
        assert_eq!(fill.filled_size, 2.0);
    }
}
