use std::collections::HashMap;

use tracing::{debug, warn};

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::history::SymbolHistory;
use crate::indicators::mean;
use crate::{warming_up, Strategy};

pub const REVISION_ENTRY_CONFIDENCE: f64 = 0.70;
pub const REVISION_EXIT_CONFIDENCE: f64 = 0.65;
pub const DEFAULT_REVISION_THRESHOLD: f64 = 0.05;

/// Price level and sign of the last significant move.
#[derive(Debug, Clone, Copy)]
struct RevisionEvent {
    price: f64,
    direction: i64,
}

/// Event-driven strategy reacting to estimate-revision style price shocks.
///
/// A bar whose return exceeds `threshold` on above-average volume is an
/// event: the strategy follows the move and remembers the event price. Once
/// price retraces past the event price by more than half the threshold, the
/// move has faded and the strategy exits.
pub struct RevisionMomentum {
    name: String,
    threshold: f64,
    lookback: usize,
    closes: SymbolHistory<f64>,
    volumes: SymbolHistory<f64>,
    events: HashMap<String, RevisionEvent>,
    config_error: Option<String>,
}

impl RevisionMomentum {
    pub fn new(threshold: f64, lookback: usize) -> Self {
        let config_error = if !(threshold.is_finite() && threshold > 0.0) {
            Some(format!("Invalid revision threshold: {threshold} (must be > 0)"))
        } else if lookback < 2 {
            Some(format!("Invalid revision lookback: {lookback} (must be >= 2)"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "RevisionMomentum misconfigured");
        }

        Self {
            name: "Revision Momentum".to_string(),
            threshold,
            lookback,
            closes: SymbolHistory::new(lookback),
            volumes: SymbolHistory::new(lookback),
            events: HashMap::new(),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether an unfaded event is being tracked for `symbol`.
    pub fn has_active_event(&self, symbol: &str) -> bool {
        self.events.contains_key(symbol)
    }
}

impl Strategy for RevisionMomentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Swing
    }

    fn reset(&mut self) {
        self.closes.clear();
        self.volumes.clear();
        self.events.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let symbol = bar.symbol.as_str();
        let position = portfolio.position(symbol);
        let prev_close = self.closes.get(symbol).and_then(|w| w.last().copied());
        let avg_volume = self
            .volumes
            .get(symbol)
            .and_then(|w| mean(&w.to_vec()))
            .unwrap_or(0.0);
        let prior = self.volumes.len(symbol);

        self.closes.push(symbol, bar.close);
        self.volumes.push(symbol, bar.volume as f64);

        let close = bar.close;
        if let Some(event) = self.events.get(symbol).copied() {
            let retrace = self.threshold / 2.0;
            let faded = match event.direction {
                1 => close < event.price * (1.0 - retrace),
                _ => close > event.price * (1.0 + retrace),
            };
            if faded {
                self.events.remove(symbol);
                debug!(strategy = %self.name, symbol, event_price = event.price, close, "revision momentum faded");
                if position.signum() != event.direction {
                    return TradeSignal::neutral(format!(
                        "Revision move faded at {close:.2} with no position to close"
                    ));
                }
                return TradeSignal::exit(
                    position,
                    REVISION_EXIT_CONFIDENCE,
                    format!(
                        "Momentum faded: {close:.2} retraced past event price {:.2}",
                        event.price
                    ),
                );
            }
        }

        let Some(prev_close) = prev_close.filter(|_| prior >= self.lookback) else {
            return warming_up(prior + 1, self.lookback + 1);
        };

        let move_pct = close / prev_close - 1.0;
        let heavy = bar.volume as f64 > avg_volume;
        if move_pct.abs() > self.threshold && heavy {
            let direction = if move_pct > 0.0 { 1 } else { -1 };
            self.events.insert(symbol.to_string(), RevisionEvent { price: close, direction });
            let reason = format!(
                "Revision event: {:+.1}% move on volume {} vs average {avg_volume:.0}",
                move_pct * 100.0,
                bar.volume
            );
            if position.signum() == direction {
                return TradeSignal::neutral(format!("Already positioned with the move: {reason}"));
            }
            return if direction > 0 {
                TradeSignal::long(REVISION_ENTRY_CONFIDENCE, reason)
            } else {
                TradeSignal::short(REVISION_ENTRY_CONFIDENCE, reason)
            };
        }

        TradeSignal::neutral(format!("No revision event ({:+.1}% move)", move_pct * 100.0))
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.closes.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.closes.capacity()
    }
}
