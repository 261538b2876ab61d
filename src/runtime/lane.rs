use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};

use crate::bus::{PublishOutcome, SignalProducer};
use crate::counters::{bump, Counters};
use crate::engine::{FillResult, SymbolEngine};
use crate::models::{FillEvent, Tick};
use crate::persistence::SnapshotStore;

/// Work arriving on a symbol's single-writer lane. Fills are enqueued by the
/// reconciler and applied before the next tick is evaluated, so the evaluator
/// always sees a consistent book.
#[derive(Debug)]
pub enum LaneEvent {
    Tick(Tick),
    Fill(FillEvent),
}

/// Drive one symbol's engine: ticks and fills in, intents out, snapshots on
/// a timer and on shutdown.
pub async fn run(
    mut engine: SymbolEngine,
    mut rx: mpsc::Receiver<LaneEvent>,
    mut producer: SignalProducer,
    mut snapshots: SnapshotStore,
    snapshot_interval_secs: u64,
    counters: Arc<Counters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut snap_timer = interval(Duration::from_secs(snapshot_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = snap_timer.tick() => {
                if let Err(e) = snapshots.save(&engine.snapshot()).await {
                    tracing::warn!("[{}] snapshot save failed: {}", engine.symbol(), e);
                }
            }
            event = rx.recv() => match event {
                None => break,
                Some(LaneEvent::Tick(tick)) => {
                    if let Some(intent) = engine.on_tick(tick.price, tick.ts) {
                        match producer.publish(&intent).await {
                            Ok(PublishOutcome::Appended(id)) => {
                                tracing::debug!(
                                    "[{}] {} published as {}",
                                    engine.symbol(),
                                    intent.action.name(),
                                    id
                                );
                            }
                            Ok(PublishOutcome::Duplicate) => {
                                bump(&counters.dedupe_hits);
                            }
                            Err(e) => {
                                // The pending slot times out and the
                                // evaluator re-proposes.
                                tracing::error!(
                                    "[{}] failed to publish {}: {}",
                                    engine.symbol(),
                                    intent.action.name(),
                                    e
                                );
                            }
                        }
                    }
                }
                Some(LaneEvent::Fill(fill)) => {
                    if let FillResult::Quarantined(reason) = engine.apply_fill(&fill) {
                        tracing::error!("[{}] fill quarantined: {}", engine.symbol(), reason);
                        if let Err(e) = producer.quarantine(&fill, &reason).await {
                            tracing::warn!(
                                "[{}] failed to park quarantined fill: {}",
                                engine.symbol(),
                                e
                            );
                        }
                    }
                }
            }
        }
    }

    if let Err(e) = snapshots.save(&engine.snapshot()).await {
        tracing::warn!("[{}] final snapshot failed: {}", engine.symbol(), e);
    }
    tracing::info!("[{}] lane stopped", engine.symbol());
}
