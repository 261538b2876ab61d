// Market-data pipeline: ticks fold into candles, candles feed indicators.
pub mod candles;
pub mod indicators;

pub use candles::CandleAggregator;
pub use indicators::{IndicatorCache, IndicatorSnapshot};
