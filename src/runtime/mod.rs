// Generator runtime: per-symbol lanes fed by the dispatcher, fill
// reconcilers, and the tick feed, built at startup and torn down together.
pub mod dispatcher;
pub mod feed;
pub mod lane;
pub mod reconciler;

use std::collections::HashMap;
use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};

use crate::bus::{fill_stream, GroupConsumer, SignalProducer};
use crate::config::Config;
use crate::counters::Counters;
use crate::engine::SymbolEngine;
use crate::persistence::SnapshotStore;
use crate::Result;

pub use dispatcher::TickDispatcher;
pub use lane::LaneEvent;

/// Consumer group under which the generator reads fill streams.
const GENERATOR_GROUP: &str = "generator";

/// Depth of each symbol lane's event queue.
const LANE_QUEUE: usize = 1024;

/// Process-wide state for one generator run: configuration, the symbol
/// lanes, the feed and the reconcilers. No ambient singletons; everything is
/// constructed here and torn down by `shutdown`.
pub struct Runtime {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl Runtime {
    /// Connect to the bus, restore per-symbol snapshots, spawn one lane and
    /// one fill reconciler per symbol plus the tick feed.
    pub async fn start(cfg: Config) -> Result<Runtime> {
        let cfg = Arc::new(cfg);
        let counters = Arc::new(Counters::default());

        let client = Client::open(cfg.redis_url.as_str())?;
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;
        tracing::info!("connected to bus at {}", cfg.redis_url);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        let mut lanes = HashMap::new();
        let consumer_name = format!("gen-{}", std::process::id());

        for symbol in &cfg.symbols {
            let mut snapshots = SnapshotStore::from_connection(conn.clone());
            let engine = match snapshots.load(symbol).await? {
                Some(snapshot) => SymbolEngine::restore(cfg.clone(), counters.clone(), snapshot),
                None => SymbolEngine::new(symbol.clone(), cfg.clone(), counters.clone()),
            };

            let (lane_tx, lane_rx) = mpsc::channel(LANE_QUEUE);

            tasks.push(tokio::spawn(lane::run(
                engine,
                lane_rx,
                SignalProducer::from_connection(conn.clone()),
                snapshots,
                cfg.snapshot_interval_secs,
                counters.clone(),
                shutdown_rx.clone(),
            )));

            let fills = GroupConsumer::with_connection(
                conn.clone(),
                fill_stream(symbol),
                GENERATOR_GROUP,
                consumer_name.clone(),
            )
            .await?;
            tasks.push(tokio::spawn(reconciler::run(
                fills,
                lane_tx.clone(),
                cfg.claim_interval_secs,
                cfg.claim_idle_threshold_secs(),
                counters.clone(),
                shutdown_rx.clone(),
            )));

            lanes.insert(symbol.clone(), lane_tx);
            tracing::info!("[{}] lane started", symbol);
        }

        let tick_dispatcher = TickDispatcher::new(lanes, counters.clone());
        tasks.push(tokio::spawn(feed::run(
            conn,
            tick_dispatcher,
            shutdown_rx,
        )));

        Ok(Runtime {
            shutdown_tx,
            tasks,
            counters,
        })
    }

    /// Signal every task, wait for lanes to drain and flush, then report
    /// counters.
    pub async fn shutdown(self) {
        tracing::info!("shutting down");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        self.counters.log_summary();
    }
}
