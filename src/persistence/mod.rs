use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Duration};

use crate::models::Lot;
use crate::strategy::CooldownRegistry;
use crate::Result;

/// Durable per-symbol generator state: the indicator ring, the open lots and
/// the cooldown map. Consumer-group cursors live in Redis itself and are not
/// duplicated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub closes: Vec<f64>,
    pub lots: Vec<Lot>,
    pub cooldowns: CooldownRegistry,
    pub taken_at: DateTime<Utc>,
}

/// Redis persistence for symbol snapshots, one JSON blob per symbol.
///
/// Saved on a periodic timer and on clean shutdown; loaded before the first
/// tick. Fills that were in flight at the time of the snapshot are re-claimed
/// from the fill stream's pending list, which replays them on top of the
/// restored book.
pub struct SnapshotStore {
    conn: ConnectionManager,
}

impl SnapshotStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;

        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;

        Ok(Self { conn })
    }

    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn key(symbol: &str) -> String {
        format!("snapshot:{symbol}")
    }

    pub async fn save(&mut self, snapshot: &SymbolSnapshot) -> Result<()> {
        let value = serde_json::to_string(snapshot)?;
        self.conn
            .set::<_, _, ()>(Self::key(&snapshot.symbol), value)
            .await?;
        tracing::debug!(
            "[{}] snapshot saved ({} closes, {} lots)",
            snapshot.symbol,
            snapshot.closes.len(),
            snapshot.lots.len()
        );
        Ok(())
    }

    pub async fn load(&mut self, symbol: &str) -> Result<Option<SymbolSnapshot>> {
        let raw: Option<String> = self.conn.get(Self::key(symbol)).await?;
        match raw {
            None => Ok(None),
            Some(json) => {
                let snapshot: SymbolSnapshot = serde_json::from_str(&json)?;
                tracing::info!(
                    "[{}] snapshot restored from {} ({} closes, {} lots)",
                    symbol,
                    snapshot.taken_at,
                    snapshot.closes.len(),
                    snapshot.lots.len()
                );
                Ok(Some(snapshot))
            }
        }
    }

    pub async fn delete(&mut self, symbol: &str) -> Result<()> {
        self.conn.del::<_, ()>(Self::key(symbol)).await?;
        Ok(())
    }
}
