use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::confidence::scaled;
use crate::history::SymbolHistory;
use crate::indicators::{average_true_range, ema, Candle};
use crate::strategies::bollinger::{BAND_BASE_CONFIDENCE, BAND_PENETRATION_SPAN};
use crate::{warming_up, Strategy};

/// Channel variant of band reversion: EMA middle line, ATR-based width.
///
/// Retains `window + 1` candles so the oldest true range has a previous close.
pub struct KeltnerChannel {
    name: String,
    window: usize,
    multiplier: f64,
    candles: SymbolHistory<Candle>,
    config_error: Option<String>,
}

impl KeltnerChannel {
    pub fn new(window: usize, multiplier: f64) -> Self {
        let config_error = if window < 2 {
            Some(format!("Invalid Keltner window: {window} (must be >= 2)"))
        } else if !(multiplier.is_finite() && multiplier > 0.0) {
            Some(format!("Invalid Keltner multiplier: {multiplier} (must be > 0)"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "KeltnerChannel misconfigured");
        }

        Self {
            name: "Keltner Channel".to_string(),
            window,
            multiplier,
            candles: SymbolHistory::new(window + 1),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Strategy for KeltnerChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Swing
    }

    fn reset(&mut self) {
        self.candles.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, _portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let need = self.window + 1;
        let history = self.candles.push(&bar.symbol, Candle::from(bar));
        if history.len() < need {
            return warming_up(history.len(), need);
        }

        let candles = history.to_vec();
        let Some(atr) = average_true_range(&candles, self.window) else {
            return warming_up(candles.len(), need);
        };
        if atr <= 0.0 {
            return TradeSignal::neutral("Insufficient range: average true range is zero");
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let middle = ema(&closes, self.window);
        let upper = middle + self.multiplier * atr;
        let lower = middle - self.multiplier * atr;
        let close = bar.close;

        if close < lower {
            TradeSignal::long(
                scaled(BAND_BASE_CONFIDENCE, BAND_PENETRATION_SPAN, (lower - close) / atr),
                format!("Keltner breakout below channel {lower:.2} (oversold), close {close:.2}"),
            )
        } else if close > upper {
            TradeSignal::short(
                scaled(BAND_BASE_CONFIDENCE, BAND_PENETRATION_SPAN, (close - upper) / atr),
                format!("Keltner breakout above channel {upper:.2} (overbought), close {close:.2}"),
            )
        } else {
            TradeSignal::neutral(format!(
                "Price {close:.2} inside channel [{lower:.2}, {upper:.2}]"
            ))
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.candles.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.candles.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{bar, flat};
    use common::{Direction, InMemoryPortfolio};

    fn feed_range(strategy: &mut KeltnerChannel, n: usize) {
        let portfolio = InMemoryPortfolio::new();
        for i in 0..n {
            strategy.evaluate(&portfolio, Some(&bar("CL", i, 100.0, 101.0, 99.0, 100.0, 1_000)));
        }
    }

    #[test]
    fn collapse_below_channel_is_long() {
        let mut strategy = KeltnerChannel::new(10, 1.5);
        feed_range(&mut strategy, 10);
        let signal = strategy.evaluate(
            &InMemoryPortfolio::new(),
            Some(&bar("CL", 10, 99.0, 99.0, 94.0, 94.5, 1_000)),
        );
        assert_eq!(signal.direction(), Direction::Long);
        assert!(signal.confidence() > BAND_BASE_CONFIDENCE);
        assert!(signal.reason().contains("oversold"));
    }

    #[test]
    fn spike_above_channel_is_short() {
        let mut strategy = KeltnerChannel::new(10, 1.5);
        feed_range(&mut strategy, 10);
        let signal = strategy.evaluate(
            &InMemoryPortfolio::new(),
            Some(&bar("CL", 10, 101.0, 106.0, 101.0, 105.5, 1_000)),
        );
        assert_eq!(signal.direction(), Direction::Short);
        assert!(signal.reason().contains("overbought"));
    }

    #[test]
    fn flat_candles_have_no_range() {
        let mut strategy = KeltnerChannel::new(3, 1.5);
        let portfolio = InMemoryPortfolio::new();
        let mut last = TradeSignal::neutral("none");
        for i in 0..4 {
            last = strategy.evaluate(&portfolio, Some(&flat("CL", i, 50.0)));
        }
        assert!(last.reason().contains("Insufficient range"));
    }
}
