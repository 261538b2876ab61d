use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};

use crate::bus::GroupConsumer;
use crate::counters::{bump, Counters};
use crate::models::FillEvent;
use crate::runtime::lane::LaneEvent;

/// Consume one symbol's fill stream under the generator's consumer group and
/// post each fill onto the symbol lane, where it is applied before the next
/// tick. Acknowledged once enqueued; fills in flight at a crash stay pending
/// and are re-claimed on the next start.
pub async fn run(
    mut consumer: GroupConsumer,
    lane_tx: mpsc::Sender<LaneEvent>,
    claim_interval_secs: u64,
    claim_idle_threshold_secs: u64,
    counters: Arc<Counters>,
    shutdown: watch::Receiver<bool>,
) {
    let claim_interval = Duration::from_secs(claim_interval_secs);
    let min_idle_ms = (claim_idle_threshold_secs * 1000) as usize;
    // Fire the first scan immediately so pending fills from a previous run
    // replay before new ones.
    let mut last_claim = Instant::now() - claim_interval;

    loop {
        if *shutdown.borrow() {
            break;
        }

        if last_claim.elapsed() >= claim_interval {
            last_claim = Instant::now();
            match consumer.claim_stale(min_idle_ms, 64).await {
                Ok(deliveries) => {
                    for delivery in deliveries {
                        handle(&mut consumer, &lane_tx, &counters, delivery).await;
                    }
                }
                Err(e) => tracing::warn!("{}: pending scan failed: {}", consumer.stream(), e),
            }
        }

        match consumer.read_batch(32, 1000).await {
            Ok(batch) => {
                for delivery in batch {
                    handle(&mut consumer, &lane_tx, &counters, delivery).await;
                }
            }
            Err(e) => {
                tracing::warn!("{}: read failed: {}", consumer.stream(), e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    tracing::info!("{}: reconciler stopped", consumer.stream());
}

async fn handle(
    consumer: &mut GroupConsumer,
    lane_tx: &mpsc::Sender<LaneEvent>,
    counters: &Counters,
    delivery: crate::bus::Delivery,
) {
    match serde_json::from_str::<FillEvent>(&delivery.payload) {
        Ok(fill) => {
            if lane_tx.send(LaneEvent::Fill(fill)).await.is_err() {
                // Lane is gone (shutdown); leave unacked for the next run.
                return;
            }
        }
        Err(e) => {
            bump(&counters.bad_ticks);
            tracing::warn!(
                "{}: dropped malformed fill {}: {}",
                consumer.stream(),
                delivery.id,
                e
            );
        }
    }
    if let Err(e) = consumer.ack(&delivery.id).await {
        tracing::warn!("{}: ack of {} failed: {}", consumer.stream(), delivery.id, e);
    }
}
