use std::collections::HashMap;

use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::confidence::{normalized, scaled};
use crate::history::SymbolHistory;
use crate::indicators::ema;
use crate::{warming_up, Strategy};

pub const KLINGER_BASE_CONFIDENCE: f64 = 0.65;
pub const KLINGER_STRENGTH_SPAN: f64 = 0.25;
pub const DEFAULT_KLINGER_FAST: usize = 34;
pub const DEFAULT_KLINGER_SLOW: usize = 55;

/// Running trend state between bars of one symbol.
#[derive(Debug, Clone, Default)]
struct ForceState {
    prev_hlc: Option<f64>,
    prev_dm: f64,
    trend: i8,
    cumulative: f64,
    oscillator: Option<f64>,
}

/// Klinger-style volume oscillator.
///
/// Trend is the sign of the change in `high + low + close`. The cumulative
/// measure adds each bar's range while the trend holds and restarts from the
/// previous range when it flips. Volume force is
/// `volume * |2 * dm / cm - 1| * trend * 100`; the oscillator is
/// `EMA(fast) - EMA(slow)` of volume force and signals on sign changes.
pub struct KlingerOscillator {
    name: String,
    fast: usize,
    slow: usize,
    forces: SymbolHistory<f64>,
    state: HashMap<String, ForceState>,
    config_error: Option<String>,
}

impl KlingerOscillator {
    pub fn new(fast: usize, slow: usize) -> Self {
        let config_error = if fast < 1 {
            Some(format!("Invalid Klinger fast period: {fast} (must be >= 1)"))
        } else if slow <= fast {
            Some(format!("Invalid Klinger slow period: {slow} (must exceed fast {fast})"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "KlingerOscillator misconfigured");
        }

        Self {
            name: "Klinger Oscillator".to_string(),
            fast,
            slow,
            forces: SymbolHistory::new(slow * 3),
            state: HashMap::new(),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for KlingerOscillator {
    fn default() -> Self {
        Self::new(DEFAULT_KLINGER_FAST, DEFAULT_KLINGER_SLOW)
    }
}

impl Strategy for KlingerOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Swing
    }

    fn reset(&mut self) {
        self.forces.clear();
        self.state.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let state = self.state.entry(bar.symbol.clone()).or_default();
        let hlc = bar.high + bar.low + bar.close;
        let dm = bar.range();

        let Some(prev_hlc) = state.prev_hlc.replace(hlc) else {
            state.prev_dm = dm;
            return warming_up(1, self.slow + 1);
        };

        let trend = if hlc > prev_hlc {
            1
        } else if hlc < prev_hlc {
            -1
        } else {
            state.trend
        };
        state.cumulative = if trend == state.trend {
            state.cumulative + dm
        } else {
            state.prev_dm + dm
        };
        state.trend = trend;
        state.prev_dm = dm;

        let force = if state.cumulative > 0.0 {
            bar.volume as f64 * (2.0 * dm / state.cumulative - 1.0).abs() * f64::from(trend) * 100.0
        } else {
            0.0
        };

        let window = self.forces.push(&bar.symbol, force);
        if window.len() < self.slow {
            return warming_up(window.len() + 1, self.slow + 1);
        }
        let forces = window.to_vec();
        let oscillator = ema(&forces, self.fast) - ema(&forces, self.slow);
        let previous = state.oscillator.replace(oscillator);

        let mean_force = forces.iter().map(|f| f.abs()).sum::<f64>() / forces.len() as f64;
        let confidence = scaled(
            KLINGER_BASE_CONFIDENCE,
            KLINGER_STRENGTH_SPAN,
            normalized(oscillator, mean_force),
        );
        let position = portfolio.position(&bar.symbol);

        match previous {
            Some(prev) if prev <= 0.0 && oscillator > 0.0 => {
                if position > 0 {
                    TradeSignal::neutral("Bullish volume-force crossover ignored: already long")
                } else {
                    TradeSignal::long(
                        confidence,
                        format!("Volume-force oscillator crossed above zero ({oscillator:.0})"),
                    )
                }
            }
            Some(prev) if prev >= 0.0 && oscillator < 0.0 => {
                if position < 0 {
                    TradeSignal::neutral("Bearish volume-force crossover ignored: already short")
                } else {
                    TradeSignal::short(
                        confidence,
                        format!("Volume-force oscillator crossed below zero ({oscillator:.0})"),
                    )
                }
            }
            _ => TradeSignal::neutral(format!("Volume-force oscillator {oscillator:.0}, no crossover")),
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.forces.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.forces.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::bar;
    use common::{Direction, InMemoryPortfolio};

    /// 20 bars trending down by 1 then 20 trending up by 1, constant range and volume.
    fn v_shape() -> Vec<MarketBar> {
        let mut closes: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        closes.extend((1..=20).map(|i| 181.0 + i as f64));
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar("QQQ", i, c, c + 1.0, c - 1.0, c, 10_000))
            .collect()
    }

    #[test]
    fn reversal_produces_bullish_crossover() {
        let mut strategy = KlingerOscillator::new(3, 6);
        let portfolio = InMemoryPortfolio::new();
        let signals: Vec<TradeSignal> = v_shape()
            .iter()
            .map(|b| strategy.evaluate(&portfolio, Some(b)))
            .collect();

        let first = signals
            .iter()
            .position(|s| !s.is_neutral())
            .expect("expected a crossover");
        assert!(first >= 20, "signal fired during the downtrend at bar {first}");
        assert_eq!(signals[first].direction(), Direction::Long);
        assert!(signals[first].confidence() >= KLINGER_BASE_CONFIDENCE);
    }

    #[test]
    fn bullish_crossover_filtered_when_long() {
        let mut strategy = KlingerOscillator::new(3, 6);
        let portfolio = InMemoryPortfolio::new().with_position("QQQ", 5);
        let signals: Vec<TradeSignal> = v_shape()
            .iter()
            .map(|b| strategy.evaluate(&portfolio, Some(b)))
            .collect();
        assert!(signals.iter().all(|s| s.direction() != Direction::Long));
        assert!(signals.iter().any(|s| s.reason().contains("already long")));
    }

    #[test]
    fn slow_must_exceed_fast() {
        let mut strategy = KlingerOscillator::new(10, 10);
        let signal = strategy.evaluate(&InMemoryPortfolio::new(), Some(&bar("QQQ", 0, 1.0, 1.0, 1.0, 1.0, 1)));
        assert!(signal.reason().contains("Invalid Klinger slow period"));
    }

    #[test]
    fn first_bar_counts_toward_warm_up() {
        let mut strategy = KlingerOscillator::new(3, 6);
        let portfolio = InMemoryPortfolio::new();
        let bars = v_shape();
        let first = strategy.evaluate(&portfolio, Some(&bars[0]));
        assert_eq!(first.reason(), "Warming up (1/7 bars)");
        let second = strategy.evaluate(&portfolio, Some(&bars[1]));
        assert_eq!(second.reason(), "Warming up (2/7 bars)");
    }
}
