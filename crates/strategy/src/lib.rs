pub mod confidence;
pub mod config;
pub mod history;
pub mod indicators;
pub mod registry;
pub mod scoring;
pub mod strategies;

pub use config::{StrategyConfig, StrategyFileConfig};
pub use history::{RollingWindow, SymbolHistory};
pub use registry::{StrategyRegistry, StrategySignal};
pub use strategies::*;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

/// All strategy implementations must satisfy this trait.
///
/// A strategy owns its per-symbol history and is driven by one ordered bar
/// stream. Callers use `evaluate`; implementations provide `on_bar`.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// Holding-period label (intraday, swing, long-term).
    fn classification(&self) -> StrategyType;

    /// Clear every per-symbol history, returning to the warm-up state.
    /// Configuration is left untouched.
    fn reset(&mut self);

    /// Description of the first invalid construction parameter, if any.
    /// A strategy with a configuration error answers NEUTRAL forever.
    fn config_error(&self) -> Option<&str> {
        None
    }

    /// Apply the strategy rule to a structurally valid bar.
    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal;

    /// Number of entries held for `symbol` in the strategy's longest series.
    /// Diagnostic accessor for tests; not part of the trading surface.
    fn history_len(&self, symbol: &str) -> usize;

    /// Upper bound `history_len` can never exceed.
    fn history_capacity(&self) -> usize;

    /// Evaluate one bar.
    ///
    /// A missing bar, a configuration error or an invalid bar yields NEUTRAL
    /// without touching history. Never panics.
    fn evaluate(&mut self, portfolio: &dyn Portfolio, bar: Option<&MarketBar>) -> TradeSignal {
        let Some(bar) = bar else {
            return TradeSignal::neutral("No bar data");
        };
        if let Some(problem) = self.config_error() {
            return TradeSignal::neutral(problem.to_string());
        }
        if !bar.is_valid() {
            return TradeSignal::neutral(format!("Invalid bar for '{}'", bar.symbol));
        }
        self.on_bar(portfolio, bar)
    }
}

/// Reason used by every strategy while its history is filling.
pub(crate) fn warming_up(have: usize, need: usize) -> TradeSignal {
    TradeSignal::neutral(format!("Warming up ({have}/{need} bars)"))
}
