use redis::aio::ConnectionManager;
use redis::streams::{StreamClaimReply, StreamPendingCountReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use tokio::time::{timeout, Duration};

use crate::bus::{with_backoff, PAYLOAD_FIELD};
use crate::Result;

/// One stream entry handed to a consumer. Stays pending until acknowledged;
/// unacked entries are re-claimed after the idle threshold.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    pub payload: String,
}

/// Consumer-group reader over one stream.
///
/// Delivery is at-least-once: each entry goes to exactly one consumer in the
/// group but is re-delivered if it is never acknowledged. A reconnecting
/// consumer first drains its pending list (via claim), then reads only
/// entries newer than the group cursor; history before group creation is not
/// replayed unless an operator rewinds the group.
pub struct GroupConsumer {
    conn: ConnectionManager,
    stream: String,
    group: String,
    consumer: String,
}

impl GroupConsumer {
    pub async fn connect(
        redis_url: &str,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
            .await
            .map_err(|_| "Redis connection timeout after 5 seconds")??;
        Self::with_connection(conn, stream, group, consumer).await
    }

    pub async fn with_connection(
        conn: ConnectionManager,
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Result<Self> {
        let mut this = Self {
            conn,
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
        };
        this.ensure_group().await?;
        Ok(this)
    }

    /// Create the group at the stream tail if it does not exist yet.
    async fn ensure_group(&mut self) -> Result<()> {
        let created: redis::RedisResult<()> = self
            .conn
            .xgroup_create_mkstream(&self.stream, &self.group, "$")
            .await;
        match created {
            Ok(()) => {
                tracing::info!("group {} created on {}", self.group, self.stream);
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Read up to `count` new entries, blocking for at most `block_ms`.
    pub async fn read_batch(&mut self, count: usize, block_ms: usize) -> Result<Vec<Delivery>> {
        let opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(count)
            .block(block_ms);
        let reply: StreamReadReply = with_backoff!(
            "XREADGROUP",
            self.conn
                .xread_options(&[&self.stream], &[">"], &opts)
        )?;
        Ok(Self::flatten(reply))
    }

    fn flatten(reply: StreamReadReply) -> Vec<Delivery> {
        let mut out = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let payload: String = entry.get(PAYLOAD_FIELD).unwrap_or_default();
                out.push(Delivery {
                    id: entry.id,
                    payload,
                });
            }
        }
        out
    }

    pub async fn ack(&mut self, id: &str) -> Result<()> {
        let _: u64 = with_backoff!(
            "XACK",
            self.conn.xack(&self.stream, &self.group, &[id])
        )?;
        Ok(())
    }

    /// Re-claim group entries idle for at least `min_idle_ms`, making this
    /// consumer their owner. Covers consumers that died mid-batch.
    pub async fn claim_stale(&mut self, min_idle_ms: usize, count: usize) -> Result<Vec<Delivery>> {
        let pending: StreamPendingCountReply = self
            .conn
            .xpending_count(&self.stream, &self.group, "-", "+", count)
            .await?;

        let stale: Vec<String> = pending
            .ids
            .iter()
            .filter(|p| p.last_delivered_ms >= min_idle_ms)
            .map(|p| p.id.clone())
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let reply: StreamClaimReply = self
            .conn
            .xclaim(&self.stream, &self.group, &self.consumer, min_idle_ms, &stale)
            .await?;

        let mut out = Vec::new();
        for entry in reply.ids {
            let payload: String = entry.get(PAYLOAD_FIELD).unwrap_or_default();
            out.push(Delivery {
                id: entry.id,
                payload,
            });
        }
        if !out.is_empty() {
            tracing::info!(
                "{} re-claimed {} stale entr(ies) on {}",
                self.consumer,
                out.len(),
                self.stream
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> ConnectionManager {
        let client = Client::open("redis://127.0.0.1:6379").unwrap();
        ConnectionManager::new(client).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_group_read_and_ack() {
        let mut conn = test_conn().await;
        let stream = "test:group_read";
        let _: redis::RedisResult<()> = conn.del(stream).await;

        let mut consumer =
            GroupConsumer::with_connection(conn.clone(), stream, "testgroup", "c1")
                .await
                .unwrap();

        let _: String = conn
            .xadd(stream, "*", &[(PAYLOAD_FIELD, "{\"n\":1}")])
            .await
            .unwrap();

        let batch = consumer.read_batch(10, 1000).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, "{\"n\":1}");

        consumer.ack(&batch[0].id).await.unwrap();

        // Acked entries are not pending anymore.
        let claimed = consumer.claim_stale(0, 10).await.unwrap();
        assert!(claimed.is_empty());

        let _: redis::RedisResult<()> = conn.del(stream).await;
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_unacked_entry_reclaimed_by_peer() {
        let mut conn = test_conn().await;
        let stream = "test:reclaim";
        let _: redis::RedisResult<()> = conn.del(stream).await;

        let mut dead = GroupConsumer::with_connection(conn.clone(), stream, "tg", "dead")
            .await
            .unwrap();
        let mut live = GroupConsumer::with_connection(conn.clone(), stream, "tg", "live")
            .await
            .unwrap();

        let _: String = conn
            .xadd(stream, "*", &[(PAYLOAD_FIELD, "{\"n\":2}")])
            .await
            .unwrap();

        // `dead` reads but never acks.
        let batch = dead.read_batch(10, 1000).await.unwrap();
        assert_eq!(batch.len(), 1);

        // `live` takes it over once idle.
        let claimed = live.claim_stale(0, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].payload, "{\"n\":2}");
        live.ack(&claimed[0].id).await.unwrap();

        let _: redis::RedisResult<()> = conn.del(stream).await;
    }
}
