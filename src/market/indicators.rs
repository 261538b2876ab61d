use std::collections::VecDeque;

use crate::models::Candle;

/// Point-in-time view of the indicators for one symbol. Only produced once
/// both figures are defined, so the evaluator never sees a half-warm state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub ma: f64,
    pub momentum: f64,
}

/// Ring of recent candle closes maintaining the moving average and the
/// momentum figure incrementally.
///
/// `ma` is undefined until `ma_period` closed candles have accumulated, and
/// all entry decisions stay suppressed until then. `momentum` compares the
/// latest close with the close `momentum_window` candles earlier and needs
/// one more close than the window.
#[derive(Debug, Clone)]
pub struct IndicatorCache {
    ma_period: usize,
    momentum_window: usize,
    closes: VecDeque<f64>,
    running_sum: f64,
}

impl IndicatorCache {
    pub fn new(ma_period: usize, momentum_window: usize) -> Self {
        Self {
            ma_period,
            momentum_window,
            closes: VecDeque::with_capacity(ma_period + 1),
            running_sum: 0.0,
        }
    }

    /// Rebuild from persisted closes (oldest first).
    pub fn from_closes(ma_period: usize, momentum_window: usize, closes: &[f64]) -> Self {
        let mut cache = Self::new(ma_period, momentum_window);
        for &close in closes {
            cache.push_close(close);
        }
        cache
    }

    pub fn on_close(&mut self, candle: &Candle) {
        self.push_close(candle.close);
    }

    fn push_close(&mut self, close: f64) {
        self.closes.push_back(close);
        self.running_sum += close;
        while self.closes.len() > self.ma_period {
            if let Some(dropped) = self.closes.pop_front() {
                self.running_sum -= dropped;
            }
        }
    }

    pub fn ma(&self) -> Option<f64> {
        if self.closes.len() < self.ma_period {
            return None;
        }
        Some(self.running_sum / self.ma_period as f64)
    }

    pub fn momentum(&self) -> Option<f64> {
        let n = self.closes.len();
        if n < self.momentum_window + 1 {
            return None;
        }
        let latest = self.closes[n - 1];
        let base = self.closes[n - 1 - self.momentum_window];
        if base <= 0.0 {
            return None;
        }
        Some((latest - base) / base)
    }

    pub fn snapshot(&self) -> Option<IndicatorSnapshot> {
        Some(IndicatorSnapshot {
            ma: self.ma()?,
            momentum: self.momentum()?,
        })
    }

    /// Retained closes, oldest first, for state snapshots.
    pub fn closes(&self) -> Vec<f64> {
        self.closes.iter().copied().collect()
    }

    pub fn closed_count(&self) -> usize {
        self.closes.len()
    }
}
