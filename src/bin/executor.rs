use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

use meanrev::config::Config;
use meanrev::executor::{ExecutorService, PaperBroker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meanrev=info,executor=info".to_string()),
        )
        .init();

    let cfg = Config::from_env()?;
    let group = std::env::var("EXECUTOR_GROUP").unwrap_or_else(|_| "executors".to_string());
    let consumer_name = std::env::var("EXECUTOR_NAME")
        .unwrap_or_else(|_| format!("exec-{}", std::process::id()));

    tracing::info!(
        "executor starting: symbols={:?} group={} consumer={}",
        cfg.symbols,
        group,
        consumer_name
    );

    let client = Client::open(cfg.redis_url.as_str())?;
    let conn = timeout(Duration::from_secs(5), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    for symbol in &cfg.symbols {
        let service = ExecutorService::start(
            conn.clone(),
            &cfg,
            symbol.clone(),
            group.clone(),
            consumer_name.clone(),
            PaperBroker::new(cfg.lot_size),
        )
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
        tasks.push(tokio::spawn(service.run(shutdown_rx.clone())));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
