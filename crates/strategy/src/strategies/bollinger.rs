use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::confidence::scaled;
use crate::history::SymbolHistory;
use crate::indicators::{mean, std_dev};
use crate::{warming_up, Strategy};

/// Confidence floor for a close outside the bands.
pub const BAND_BASE_CONFIDENCE: f64 = 0.65;
/// Extra confidence for a penetration of one full dispersion unit.
pub const BAND_PENETRATION_SPAN: f64 = 0.30;

/// Mean reversion on closes outside `mean ± multiplier * σ`.
///
/// The window includes the bar being evaluated, so no close can sit more
/// than `(window - 1) / sqrt(window)` population deviations from the mean.
/// A multiplier at or beyond that bound is rejected: with 2.0 the window
/// must be at least 6.
pub struct BollingerReversion {
    name: String,
    window: usize,
    multiplier: f64,
    closes: SymbolHistory<f64>,
    config_error: Option<String>,
}

impl BollingerReversion {
    pub fn new(window: usize, multiplier: f64) -> Self {
        let config_error = if window < 2 {
            Some(format!("Invalid Bollinger window: {window} (must be >= 2)"))
        } else if !(multiplier.is_finite() && multiplier > 0.0) {
            Some(format!("Invalid Bollinger multiplier: {multiplier} (must be > 0)"))
        } else if multiplier >= max_deviation(window) {
            Some(format!(
                "Invalid Bollinger multiplier: {multiplier} unreachable with window {window} (largest deviation {:.2})",
                max_deviation(window)
            ))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "BollingerReversion misconfigured");
        }

        Self {
            name: "Bollinger Reversion".to_string(),
            window,
            multiplier,
            closes: SymbolHistory::new(window),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Largest |z| a close can reach in a population window that contains it.
fn max_deviation(window: usize) -> f64 {
    let n = window as f64;
    (n - 1.0) / n.sqrt()
}

impl Strategy for BollingerReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Swing
    }

    fn reset(&mut self) {
        self.closes.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, _portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let window = self.closes.push(&bar.symbol, bar.close);
        if window.len() < self.window {
            return warming_up(window.len(), self.window);
        }

        let closes = window.to_vec();
        let (Some(middle), Some(sigma)) = (mean(&closes), std_dev(&closes)) else {
            return warming_up(closes.len(), self.window);
        };
        if sigma <= 0.0 {
            return TradeSignal::neutral("Insufficient volatility: band width is zero");
        }

        let upper = middle + self.multiplier * sigma;
        let lower = middle - self.multiplier * sigma;
        let close = bar.close;

        if close < lower {
            let confidence = scaled(BAND_BASE_CONFIDENCE, BAND_PENETRATION_SPAN, (lower - close) / sigma);
            TradeSignal::long(
                confidence,
                format!("Price {close:.2} below lower band {lower:.2} (oversold)"),
            )
        } else if close > upper {
            let confidence = scaled(BAND_BASE_CONFIDENCE, BAND_PENETRATION_SPAN, (close - upper) / sigma);
            TradeSignal::short(
                confidence,
                format!("Price {close:.2} above upper band {upper:.2} (overbought)"),
            )
        } else {
            TradeSignal::neutral(format!(
                "Price {close:.2} inside bands [{lower:.2}, {upper:.2}]"
            ))
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.closes.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.closes.capacity()
    }
}
