use std::env;

use crate::error::ConfigError;

/// Immutable per-run configuration, read once at startup from the
/// environment. Every knob has a default; invalid values abort the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub symbols: Vec<String>,

    /// Candles included in the moving average.
    pub ma_period: usize,
    /// Seconds per candle.
    pub candle_period_secs: u64,
    /// Candles for the momentum figure.
    pub momentum_window: usize,
    /// Absolute momentum threshold gating entries.
    pub momentum_threshold: f64,
    /// Fractional MA deviation threshold.
    pub ma_thr_eff: f64,
    /// Cap on book size.
    pub max_lots: usize,
    /// Seconds after INIT during which INIT2/INIT3 stay eligible.
    pub init_window_secs: u64,
    pub scale_in_cooldown_secs: u64,
    pub scaleout_cooldown_secs: u64,
    /// Newest-lot age window for the near-touch exit.
    pub near_touch_window_secs: u64,
    /// Fractional MA proximity for the near-touch exit.
    pub near_touch_eps: f64,
    /// Favourable-gap fraction for risk control.
    pub risk_control_threshold: f64,
    /// Seconds before an unfilled intent is released for re-proposal.
    pub intent_pending_timeout_secs: u64,

    /// Base order size per entry.
    pub lot_size: f64,
    /// Seconds between periodic state snapshots.
    pub snapshot_interval_secs: u64,
    /// Seconds between pending-list scans on the consumer side.
    pub claim_interval_secs: u64,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(default);
            }
            trimmed
                .parse()
                .map_err(|_| ConfigError(format!("{name}: cannot parse {trimmed:?}")))
        }
        Err(_) => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            symbols: vec!["BTCUSD".to_string()],
            ma_period: 100,
            candle_period_secs: 60,
            momentum_window: 3,
            momentum_threshold: 0.003,
            ma_thr_eff: 0.01,
            max_lots: 4,
            init_window_secs: 15 * 60,
            scale_in_cooldown_secs: 30 * 60,
            scaleout_cooldown_secs: 30 * 60,
            near_touch_window_secs: 60 * 60,
            near_touch_eps: 0.001,
            risk_control_threshold: 0.003,
            intent_pending_timeout_secs: 60,
            lot_size: 1.0,
            snapshot_interval_secs: 300,
            claim_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load from `MEANREV_*` environment variables, falling back to
    /// defaults, then validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Config::default();
        let symbols: Vec<String> = env_str("MEANREV_SYMBOLS", "BTCUSD")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let cfg = Config {
            redis_url: env_str("REDIS_URL", &d.redis_url),
            symbols,
            ma_period: env_parsed("MEANREV_MA_PERIOD", d.ma_period)?,
            candle_period_secs: env_parsed("MEANREV_CANDLE_PERIOD", d.candle_period_secs)?,
            momentum_window: env_parsed("MEANREV_MOMENTUM_WINDOW", d.momentum_window)?,
            momentum_threshold: env_parsed("MEANREV_MOMENTUM_THRESHOLD", d.momentum_threshold)?,
            ma_thr_eff: env_parsed("MEANREV_MA_THR_EFF", d.ma_thr_eff)?,
            max_lots: env_parsed("MEANREV_MAX_LOTS", d.max_lots)?,
            init_window_secs: env_parsed("MEANREV_INIT_WINDOW", d.init_window_secs)?,
            scale_in_cooldown_secs: env_parsed("MEANREV_SCALE_IN_COOLDOWN", d.scale_in_cooldown_secs)?,
            scaleout_cooldown_secs: env_parsed("MEANREV_SCALEOUT_COOLDOWN", d.scaleout_cooldown_secs)?,
            near_touch_window_secs: env_parsed("MEANREV_NEAR_TOUCH_WINDOW", d.near_touch_window_secs)?,
            near_touch_eps: env_parsed("MEANREV_NEAR_TOUCH_EPS", d.near_touch_eps)?,
            risk_control_threshold: env_parsed("MEANREV_RISK_CONTROL_THRESHOLD", d.risk_control_threshold)?,
            intent_pending_timeout_secs: env_parsed("MEANREV_INTENT_PENDING_TIMEOUT", d.intent_pending_timeout_secs)?,
            lot_size: env_parsed("MEANREV_LOT_SIZE", d.lot_size)?,
            snapshot_interval_secs: env_parsed("MEANREV_SNAPSHOT_INTERVAL", d.snapshot_interval_secs)?,
            claim_interval_secs: env_parsed("MEANREV_CLAIM_INTERVAL", d.claim_interval_secs)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError("no symbols configured".to_string()));
        }
        if self.candle_period_secs == 0 {
            return Err(ConfigError("candle_period must be positive".to_string()));
        }
        if self.ma_period <= self.momentum_window {
            return Err(ConfigError(format!(
                "ma_period ({}) must exceed momentum_window ({})",
                self.ma_period, self.momentum_window
            )));
        }
        if self.momentum_window == 0 {
            return Err(ConfigError("momentum_window must be positive".to_string()));
        }
        if self.max_lots == 0 {
            return Err(ConfigError("max_lots must be positive".to_string()));
        }
        for (name, v) in [
            ("ma_thr_eff", self.ma_thr_eff),
            ("momentum_threshold", self.momentum_threshold),
            ("near_touch_eps", self.near_touch_eps),
            ("risk_control_threshold", self.risk_control_threshold),
            ("lot_size", self.lot_size),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError(format!("{name} must be a positive number, got {v}")));
            }
        }
        if self.intent_pending_timeout_secs == 0 {
            return Err(ConfigError("intent_pending_timeout must be positive".to_string()));
        }
        if self.claim_interval_secs == 0 {
            return Err(ConfigError("claim_interval must be positive".to_string()));
        }
        Ok(())
    }

    /// Idle threshold after which another consumer may re-claim a pending
    /// entry. Fixed at twice the claim interval.
    pub fn claim_idle_threshold_secs(&self) -> u64 {
        self.claim_interval_secs * 2
    }
}
