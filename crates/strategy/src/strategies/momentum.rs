use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::confidence::{normalized, scaled};
use crate::history::SymbolHistory;
use crate::{warming_up, Strategy};

/// Confidence of any directional momentum signal before strength is added.
pub const MOMENTUM_BASE_CONFIDENCE: f64 = 0.5;
/// Confidence added by each of momentum and acceleration at full strength.
pub const MOMENTUM_COMPONENT_SPAN: f64 = 0.25;
/// Move, in percent of price, that counts as full strength.
const FULL_STRENGTH_PCT: f64 = 1.0;

/// Trend-following on price momentum that is itself speeding up.
///
/// Momentum at bar `i` is `close(i) - close(i - momentum_window)`. The window
/// retains `momentum_window + acceleration_window` closes, which yields
/// `acceleration_window` momentum samples; acceleration is the newest sample
/// minus the oldest.
pub struct AcceleratingMomentum {
    name: String,
    momentum_window: usize,
    acceleration_window: usize,
    closes: SymbolHistory<f64>,
    config_error: Option<String>,
}

impl AcceleratingMomentum {
    pub fn new(momentum_window: usize, acceleration_window: usize) -> Self {
        let config_error = if momentum_window < 1 {
            Some(format!("Invalid momentum window: {momentum_window} (must be >= 1)"))
        } else if acceleration_window < 2 {
            Some(format!(
                "Invalid acceleration window: {acceleration_window} (must be >= 2)"
            ))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "AcceleratingMomentum misconfigured");
        }

        Self {
            name: "Accelerating Momentum".to_string(),
            momentum_window,
            acceleration_window,
            closes: SymbolHistory::new(momentum_window + acceleration_window),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Strategy for AcceleratingMomentum {
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
        let need = self.momentum_window + self.acceleration_window;
        let window = self.closes.push(&bar.symbol, bar.close);
        if window.len() < need {
            return warming_up(window.len(), need);
        }

        let closes = window.to_vec();
        let samples: Vec<f64> = (self.momentum_window..closes.len())
            .map(|i| closes[i] - closes[i - self.momentum_window])
            .collect();
        let (Some(&oldest), Some(&momentum)) = (samples.first(), samples.last()) else {
            return warming_up(closes.len(), need);
        };
        let acceleration = momentum - oldest;

        let full_strength = bar.close * FULL_STRENGTH_PCT / 100.0;
        let confidence = scaled(
            scaled(
                MOMENTUM_BASE_CONFIDENCE,
                MOMENTUM_COMPONENT_SPAN,
                normalized(momentum, full_strength),
            ),
            MOMENTUM_COMPONENT_SPAN,
            normalized(acceleration, full_strength),
        );

        if momentum > 0.0 && acceleration > 0.0 {
            TradeSignal::long(
                confidence,
                format!("Accelerating upward momentum: momentum {momentum:.4}, acceleration {acceleration:.4}"),
            )
        } else if momentum < 0.0 && acceleration < 0.0 {
            TradeSignal::short(
                confidence,
                format!("Accelerating downward momentum: momentum {momentum:.4}, acceleration {acceleration:.4}"),
            )
        } else {
            TradeSignal::neutral(format!(
                "Momentum {momentum:.4} and acceleration {acceleration:.4} disagree"
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
