pub mod atr;
pub mod ema;
pub mod stats;
pub mod vwap;

pub use atr::{average_true_range, true_range};
pub use ema::ema;
pub use stats::{covariance, mean, simple_returns, std_dev, variance, z_score};
pub use vwap::vwap;

use common::MarketBar;

/// Compact copy of the numeric part of a bar, kept in rolling windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    /// Upper edge of the body.
    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Lower edge of the body.
    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

impl From<&MarketBar> for Candle {
    fn from(bar: &MarketBar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume as f64,
        }
    }
}
