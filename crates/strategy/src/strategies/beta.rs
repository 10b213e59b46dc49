use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::history::{RollingWindow, SymbolHistory};
use crate::indicators::{covariance, simple_returns, variance};
use crate::{warming_up, Strategy};

pub const BETA_ENTRY_CONFIDENCE: f64 = 0.60;
pub const BETA_EXIT_CONFIDENCE: f64 = 0.65;
pub const DEFAULT_LOW_BETA: f64 = 0.8;
pub const DEFAULT_HIGH_BETA: f64 = 1.2;
pub const DEFAULT_BETA_DRIFT: f64 = 0.3;

/// Asset and market closes observed at the same bar timestamp.
#[derive(Debug, Clone, Copy)]
struct AlignedClose {
    at: DateTime<Utc>,
    asset: f64,
    market: f64,
}

/// Betting-against-beta: long low-beta names, short high-beta names.
///
/// Bars for `market_symbol` feed the market proxy. Every other symbol keeps
/// `window + 1` closes paired with the market close of the same timestamp,
/// so beta is estimated over `window` aligned return pairs whatever order
/// the two bars of a period arrive in. An asset bar whose market bar has not
/// arrived yet waits until it does.
pub struct BettingAgainstBeta {
    name: String,
    market_symbol: String,
    window: usize,
    low_beta: f64,
    high_beta: f64,
    exit_drift: f64,
    market_closes: RollingWindow<(DateTime<Utc>, f64)>,
    aligned: SymbolHistory<AlignedClose>,
    pending: HashMap<String, (DateTime<Utc>, f64)>,
    entry_beta: HashMap<String, f64>,
    config_error: Option<String>,
}

impl BettingAgainstBeta {
    pub fn new(market_symbol: impl Into<String>, window: usize) -> Self {
        Self::with_thresholds(market_symbol, window, DEFAULT_LOW_BETA, DEFAULT_HIGH_BETA, DEFAULT_BETA_DRIFT)
    }

    pub fn with_thresholds(
        market_symbol: impl Into<String>,
        window: usize,
        low_beta: f64,
        high_beta: f64,
        exit_drift: f64,
    ) -> Self {
        let market_symbol = market_symbol.into();
        let config_error = if window < 2 {
            Some(format!("Invalid beta window: {window} (must be >= 2)"))
        } else if market_symbol.is_empty() {
            Some("Invalid market symbol: must not be empty".to_string())
        } else if !(low_beta < high_beta) {
            Some(format!("Invalid beta thresholds: low {low_beta} must be below high {high_beta}"))
        } else if !(exit_drift > 0.0) {
            Some(format!("Invalid beta exit drift: {exit_drift} (must be > 0)"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "BettingAgainstBeta misconfigured");
        }

        Self {
            name: "Betting Against Beta".to_string(),
            market_symbol,
            window,
            low_beta,
            high_beta,
            exit_drift,
            market_closes: RollingWindow::new(window + 1),
            aligned: SymbolHistory::new(window + 1),
            pending: HashMap::new(),
            entry_beta: HashMap::new(),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn market_close_at(&self, at: DateTime<Utc>) -> Option<f64> {
        self.market_closes
            .iter()
            .rev()
            .find(|(t, _)| *t == at)
            .map(|(_, close)| *close)
    }

    fn last_aligned_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.aligned.get(symbol)?.last().map(|c| c.at)
    }

    /// Record a market close and complete every asset bar waiting on it.
    fn on_market_bar(&mut self, bar: &MarketBar) -> TradeSignal {
        let at = bar.timestamp;
        if self.market_closes.last().is_some_and(|(last, _)| *last >= at) {
            return TradeSignal::neutral(format!(
                "Stale market proxy bar for {} at {at}",
                self.market_symbol
            ));
        }
        self.market_closes.push((at, bar.close));

        let ready: Vec<(String, f64)> = self
            .pending
            .iter()
            .filter(|(_, (t, _))| *t == at)
            .map(|(symbol, (_, close))| (symbol.clone(), *close))
            .collect();
        self.pending.retain(|_, (t, _)| *t > at);
        for (symbol, asset) in ready {
            self.aligned.push(&symbol, AlignedClose { at, asset, market: bar.close });
        }

        TradeSignal::neutral(format!("Market proxy {} updated", self.market_symbol))
    }

    fn estimate_beta(&self, symbol: &str) -> Option<f64> {
        let closes = self.aligned.get(symbol)?;
        let asset = simple_returns(&closes.iter().map(|c| c.asset).collect::<Vec<_>>());
        let market = simple_returns(&closes.iter().map(|c| c.market).collect::<Vec<_>>());
        let market_var = variance(&market)?;
        if market_var <= 0.0 {
            return None;
        }
        Some(covariance(&asset, &market)? / market_var)
    }
}

impl Strategy for BettingAgainstBeta {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::LongTerm
    }

    fn reset(&mut self) {
        self.market_closes.clear();
        self.aligned.clear();
        self.pending.clear();
        self.entry_beta.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        if bar.symbol == self.market_symbol {
            return self.on_market_bar(bar);
        }
        let symbol = bar.symbol.as_str();
        let at = bar.timestamp;

        let Some(&(latest_market, _)) = self.market_closes.last() else {
            return TradeSignal::neutral(format!(
                "Waiting for market proxy {} data",
                self.market_symbol
            ));
        };
        if self.last_aligned_at(symbol).is_some_and(|last| last >= at) {
            return TradeSignal::neutral(format!("Stale bar for {symbol} at {at}"));
        }

        if let Some(market) = self.market_close_at(at) {
            self.pending.remove(symbol);
            self.aligned.push(symbol, AlignedClose { at, asset: bar.close, market });
        } else if latest_market < at {
            self.pending.insert(symbol.to_string(), (at, bar.close));
        } else {
            return TradeSignal::neutral(format!(
                "No market proxy {} bar at {at} to pair with {symbol}",
                self.market_symbol
            ));
        }

        let aligned = self.aligned.len(symbol);
        if aligned < self.window + 1 {
            return warming_up(aligned, self.window + 1);
        }

        let Some(beta) = self.estimate_beta(symbol) else {
            return TradeSignal::neutral("Insufficient market variance to estimate beta");
        };

        let position = portfolio.position(symbol);
        if position != 0 {
            let entry = *self.entry_beta.entry(symbol.to_string()).or_insert(beta);
            let drift = beta - entry;
            let thesis_broken = (position > 0 && drift > self.exit_drift)
                || (position < 0 && -drift > self.exit_drift);
            if thesis_broken {
                self.entry_beta.remove(symbol);
                debug!(strategy = %self.name, symbol, entry, beta, "beta drifted past exit threshold");
                return TradeSignal::exit(
                    position,
                    BETA_EXIT_CONFIDENCE,
                    format!("Beta moved from {entry:.2} to {beta:.2} since entry; exiting"),
                );
            }
            return TradeSignal::neutral(format!(
                "Holding {position}: beta {beta:.2} (entry {entry:.2})"
            ));
        }

        if beta < self.low_beta {
            self.entry_beta.insert(symbol.to_string(), beta);
            TradeSignal::long(
                BETA_ENTRY_CONFIDENCE,
                format!("Low beta {beta:.2} < {:.2}: betting against beta", self.low_beta),
            )
        } else if beta > self.high_beta {
            self.entry_beta.insert(symbol.to_string(), beta);
            TradeSignal::short(
                BETA_ENTRY_CONFIDENCE,
                format!("High beta {beta:.2} > {:.2}: betting against beta", self.high_beta),
            )
        } else {
            self.entry_beta.remove(symbol);
            TradeSignal::neutral(format!(
                "Beta {beta:.2} within [{:.2}, {:.2}]",
                self.low_beta, self.high_beta
            ))
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        if symbol == self.market_symbol {
            self.market_closes.len()
        } else {
            self.aligned.len(symbol)
        }
    }

    fn history_capacity(&self) -> usize {
        self.window + 1
    }
}
