use chrono::{DateTime, Utc};
use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::history::RollingWindow;
use crate::indicators::z_score;
use crate::{warming_up, Strategy};

pub const PAIRS_ENTRY_CONFIDENCE: f64 = 0.7;
pub const PAIRS_EXIT_CONFIDENCE: f64 = 0.6;
pub const DEFAULT_PAIRS_EXIT_Z: f64 = 0.5;

/// Statistical arbitrage on the price ratio of two symbols.
///
/// Signals are expressed for the ratio `A / B`: LONG means long A against B.
/// The held position is read from leg A. The two legs are kept in lock-step:
/// a close is recorded only once the other leg has reported a bar with the
/// same timestamp, and the bar completing the pair is the one evaluated.
pub struct PairsTrading {
    name: String,
    symbol_a: String,
    symbol_b: String,
    window: usize,
    entry_z: f64,
    exit_z: f64,
    prices_a: RollingWindow<f64>,
    prices_b: RollingWindow<f64>,
    pending_a: Option<(DateTime<Utc>, f64)>,
    pending_b: Option<(DateTime<Utc>, f64)>,
    last_paired_at: Option<DateTime<Utc>>,
    config_error: Option<String>,
}

impl PairsTrading {
    pub fn new(
        symbol_a: impl Into<String>,
        symbol_b: impl Into<String>,
        window: usize,
        entry_z: f64,
    ) -> Self {
        Self::with_exit(symbol_a, symbol_b, window, entry_z, DEFAULT_PAIRS_EXIT_Z)
    }

    pub fn with_exit(
        symbol_a: impl Into<String>,
        symbol_b: impl Into<String>,
        window: usize,
        entry_z: f64,
        exit_z: f64,
    ) -> Self {
        let symbol_a = symbol_a.into();
        let symbol_b = symbol_b.into();
        let config_error = if window < 2 {
            Some(format!("Invalid pairs window: {window} (must be >= 2)"))
        } else if symbol_a.is_empty() || symbol_a == symbol_b {
            Some(format!("Invalid pair: '{symbol_a}' / '{symbol_b}' must be two distinct symbols"))
        } else if !(entry_z > 0.0 && exit_z >= 0.0 && exit_z < entry_z) {
            Some(format!(
                "Invalid z thresholds: entry {entry_z} must exceed exit {exit_z} >= 0"
            ))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "PairsTrading misconfigured");
        }

        Self {
            name: format!("Pairs {symbol_a}/{symbol_b}"),
            symbol_a,
            symbol_b,
            window,
            entry_z,
            exit_z,
            prices_a: RollingWindow::new(window),
            prices_b: RollingWindow::new(window),
            pending_a: None,
            pending_b: None,
            last_paired_at: None,
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Strategy for PairsTrading {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Swing
    }

    fn reset(&mut self) {
        self.prices_a.clear();
        self.prices_b.clear();
        self.pending_a = None;
        self.pending_b = None;
        self.last_paired_at = None;
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let is_a = bar.symbol == self.symbol_a;
        if !is_a && bar.symbol != self.symbol_b {
            return TradeSignal::neutral(format!(
                "Symbol {} not part of pair {}/{}",
                bar.symbol, self.symbol_a, self.symbol_b
            ));
        }

        let at = bar.timestamp;
        if self.last_paired_at.is_some_and(|last| last >= at) {
            return TradeSignal::neutral(format!("Stale bar for {} at {at}", bar.symbol));
        }

        let (own, other) = if is_a {
            (&mut self.pending_a, &mut self.pending_b)
        } else {
            (&mut self.pending_b, &mut self.pending_a)
        };
        let other_pending = *other;
        let other_close = match other_pending {
            Some((other_at, _)) if other_at > at => {
                return TradeSignal::neutral(format!("Stale bar for {} at {at}", bar.symbol));
            }
            Some((other_at, close)) if other_at == at => close,
            _ => {
                *other = None;
                *own = Some((at, bar.close));
                return TradeSignal::neutral(format!("Waiting for both pairs to report at {at}"));
            }
        };
        *own = None;
        *other = None;

        let (a, b) = if is_a {
            (bar.close, other_close)
        } else {
            (other_close, bar.close)
        };
        self.prices_a.push(a);
        self.prices_b.push(b);
        self.last_paired_at = Some(at);

        let paired = self.prices_a.len();
        if paired < self.window {
            return warming_up(paired, self.window);
        }

        let ratios: Vec<f64> = self
            .prices_a
            .iter()
            .zip(self.prices_b.iter())
            .map(|(a, b)| a / b)
            .collect();
        let ratio = a / b;
        let Some(z) = z_score(ratio, &ratios) else {
            return TradeSignal::neutral(format!("Insufficient spread variance at ratio {ratio:.4}"));
        };

        let position = portfolio.position(&self.symbol_a);
        if position != 0 {
            if z.abs() < self.exit_z {
                return TradeSignal::exit(
                    position,
                    PAIRS_EXIT_CONFIDENCE,
                    format!("Spread converged: z {z:.2} within ±{:.2}", self.exit_z),
                );
            }
            return TradeSignal::neutral(format!("Holding pair position, z {z:.2}"));
        }

        if z <= -self.entry_z {
            TradeSignal::long(
                PAIRS_ENTRY_CONFIDENCE,
                format!("Ratio {ratio:.4} undervalued: z {z:.2} <= -{:.2}", self.entry_z),
            )
        } else if z >= self.entry_z {
            TradeSignal::short(
                PAIRS_ENTRY_CONFIDENCE,
                format!("Ratio {ratio:.4} overvalued: z {z:.2} >= {:.2}", self.entry_z),
            )
        } else {
            TradeSignal::neutral(format!("Spread z {z:.2} within ±{:.2}", self.entry_z))
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        if symbol == self.symbol_a {
            self.prices_a.len()
        } else if symbol == self.symbol_b {
            self.prices_b.len()
        } else {
            0
        }
    }

    fn history_capacity(&self) -> usize {
        self.window
    }
}
