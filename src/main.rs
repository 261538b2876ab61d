use meanrev::config::Config;
use meanrev::runtime::Runtime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meanrev=info".to_string()),
        )
        .init();

    let cfg = Config::from_env()?;
    tracing::info!(
        "signal generator starting: symbols={:?} ma_period={} ma_thr_eff={} momentum_threshold={}",
        cfg.symbols,
        cfg.ma_period,
        cfg.ma_thr_eff,
        cfg.momentum_threshold
    );

    let runtime = Runtime::start(cfg)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    tokio::signal::ctrl_c().await?;
    runtime.shutdown().await;
    Ok(())
}
