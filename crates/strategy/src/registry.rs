use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{Error, FundamentalsProvider, MarketBar, Portfolio, Result, TradeSignal};

use crate::config::{StrategyConfig, StrategyFileConfig};
use crate::strategies::{
    AcceleratingMomentum, BettingAgainstBeta, BollingerReversion, CandlestickPatterns,
    EarningsYieldStrategy, KeltnerChannel, KlingerOscillator, PairsTrading, PriceToSalesStrategy,
    QualityGrowthStrategy, RevisionMomentum, TwapExecution, VolumeProfile,
};
use crate::Strategy;

/// A directional signal tagged with the strategy and bar that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct StrategySignal {
    pub strategy: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub signal: TradeSignal,
}

struct Slot {
    strategy: Box<dyn Strategy>,
    /// Empty = every symbol.
    symbols: Vec<String>,
}

impl Slot {
    fn accepts(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s == symbol)
    }
}

/// Holds independent strategy instances and fans each bar out to them.
///
/// Instances never see each other's bars or state; the registry is only a
/// caller that routes by symbol.
#[derive(Default)]
pub struct StrategyRegistry {
    slots: Vec<Slot>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config. Fails on unknown strategy types or
    /// missing required parameters.
    pub fn from_config(
        file_cfg: &StrategyFileConfig,
        fundamentals: Arc<dyn FundamentalsProvider>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for cfg in &file_cfg.strategies {
            let strategy = build_strategy(cfg, Arc::clone(&fundamentals))?;
            registry.register(strategy, cfg.symbols.clone());
        }
        Ok(registry)
    }

    /// Add a strategy that receives bars for `symbols` (all symbols if empty).
    pub fn register(&mut self, strategy: Box<dyn Strategy>, symbols: Vec<String>) {
        info!(
            name = %strategy.name(),
            classification = %strategy.classification(),
            symbols = ?symbols,
            "Registered strategy"
        );
        if let Some(problem) = strategy.config_error() {
            warn!(name = %strategy.name(), %problem, "Strategy will stay neutral");
        }
        self.slots.push(Slot { strategy, symbols });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.strategy.name()).collect()
    }

    /// Return every strategy to its warm-up state.
    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.strategy.reset();
        }
    }

    /// Process one bar. Returns the non-neutral signals of all strategies
    /// routed to the bar's symbol.
    pub fn process(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> Vec<StrategySignal> {
        self.slots
            .iter_mut()
            .filter(|slot| slot.accepts(&bar.symbol))
            .filter_map(|slot| {
                let signal = slot.strategy.evaluate(portfolio, Some(bar));
                if signal.is_neutral() {
                    debug!(
                        strategy = %slot.strategy.name(),
                        symbol = %bar.symbol,
                        reason = %signal.reason(),
                        "neutral"
                    );
                    return None;
                }
                info!(strategy = %slot.strategy.name(), symbol = %bar.symbol, %signal, "Signal");
                Some(StrategySignal {
                    strategy: slot.strategy.name().to_string(),
                    symbol: bar.symbol.clone(),
                    timestamp: bar.timestamp,
                    signal,
                })
            })
            .collect()
    }

    /// Run the dispatch loop.
    /// Reads bars from `bar_rx` in order and pushes signals to `signal_tx`.
    /// Returns once either channel closes.
    pub async fn run(
        mut self,
        mut bar_rx: mpsc::Receiver<MarketBar>,
        signal_tx: mpsc::Sender<StrategySignal>,
        portfolio: Arc<dyn Portfolio>,
    ) {
        info!(strategies = self.len(), "StrategyRegistry running");
        let mut bars = 0u64;
        while let Some(bar) = bar_rx.recv().await {
            bars += 1;
            for signal in self.process(portfolio.as_ref(), &bar) {
                if signal_tx.send(signal).await.is_err() {
                    warn!("Signal channel closed, stopping strategy registry");
                    return;
                }
            }
        }
        info!(bars, "Bar channel closed, strategy registry finished");
    }
}

// ─── Strategy builders ────────────────────────────────────────────────────────

fn build_strategy(
    cfg: &StrategyConfig,
    fundamentals: Arc<dyn FundamentalsProvider>,
) -> Result<Box<dyn Strategy>> {
    let p = &cfg.params;
    let strategy: Box<dyn Strategy> = match cfg.strategy_type.as_str() {
        "momentum" => Box::new(
            AcceleratingMomentum::new(
                param_usize(p, "momentum_window", 10),
                param_usize(p, "acceleration_window", 5),
            )
            .with_name(&cfg.name),
        ),
        "bollinger" => Box::new(
            BollingerReversion::new(param_usize(p, "window", 20), param_f64(p, "multiplier", 2.0))
                .with_name(&cfg.name),
        ),
        "keltner" => Box::new(
            KeltnerChannel::new(param_usize(p, "window", 20), param_f64(p, "multiplier", 1.5))
                .with_name(&cfg.name),
        ),
        "betting_against_beta" => Box::new(
            BettingAgainstBeta::with_thresholds(
                param_str(p, "market_symbol").unwrap_or("SPY"),
                param_usize(p, "window", 60),
                param_f64(p, "low_beta", crate::strategies::beta::DEFAULT_LOW_BETA),
                param_f64(p, "high_beta", crate::strategies::beta::DEFAULT_HIGH_BETA),
                param_f64(p, "exit_drift", crate::strategies::beta::DEFAULT_BETA_DRIFT),
            )
            .with_name(&cfg.name),
        ),
        "pairs" => Box::new(
            PairsTrading::with_exit(
                required_str(cfg, "symbol_a")?,
                required_str(cfg, "symbol_b")?,
                param_usize(p, "window", 30),
                param_f64(p, "entry_z", 2.0),
                param_f64(p, "exit_z", crate::strategies::pairs::DEFAULT_PAIRS_EXIT_Z),
            )
            .with_name(&cfg.name),
        ),
        "earnings_yield" => Box::new(
            EarningsYieldStrategy::earnings_yield(
                param_f64(p, "min_yield", 0.05),
                param_usize(p, "lookback", 20),
            )
            .with_provider(fundamentals)
            .with_name(&cfg.name),
        ),
        "price_to_sales" => Box::new(
            PriceToSalesStrategy::price_to_sales(
                param_f64(p, "max_ps", 2.0),
                param_usize(p, "lookback", 20),
            )
            .with_provider(fundamentals)
            .with_name(&cfg.name),
        ),
        "quality_growth" => Box::new(
            QualityGrowthStrategy::quality_growth(
                param_f64(p, "min_growth", 0.10),
                param_usize(p, "lookback", 40),
            )
            .with_provider(fundamentals)
            .with_name(&cfg.name),
        ),
        "twap" => {
            let target_volume = p
                .get("target_volume")
                .and_then(|v| v.as_integer())
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| invalid(cfg, "target_volume", "required positive integer"))?;
            let duration = Duration::try_minutes(param_i64(p, "duration_minutes", 60))
                .ok_or_else(|| invalid(cfg, "duration_minutes", "out of range"))?;
            let slices = u32::try_from(param_i64(p, "slices", 10))
                .map_err(|_| invalid(cfg, "slices", "must fit in an unsigned 32-bit integer"))?;
            Box::new(
                TwapExecution::with_tolerance(
                    target_volume,
                    duration,
                    slices,
                    param_f64(p, "tolerance", crate::strategies::twap::DEFAULT_TWAP_TOLERANCE),
                )
                .with_name(&cfg.name),
            )
        }
        "volume_profile" => Box::new(
            VolumeProfile::new(param_usize(p, "lookback", 50), param_usize(p, "bins", 20))
                .with_name(&cfg.name),
        ),
        "candlestick" => Box::new(CandlestickPatterns::new().with_name(&cfg.name)),
        "klinger" => Box::new(
            KlingerOscillator::new(
                param_usize(p, "fast", crate::strategies::klinger::DEFAULT_KLINGER_FAST),
                param_usize(p, "slow", crate::strategies::klinger::DEFAULT_KLINGER_SLOW),
            )
            .with_name(&cfg.name),
        ),
        "revision" => Box::new(
            RevisionMomentum::new(
                param_f64(p, "threshold", crate::strategies::revision::DEFAULT_REVISION_THRESHOLD),
                param_usize(p, "lookback", 20),
            )
            .with_name(&cfg.name),
        ),
        other => return Err(Error::UnknownStrategy(other.to_string())),
    };
    Ok(strategy)
}

fn invalid(cfg: &StrategyConfig, key: &str, message: &str) -> Error {
    Error::InvalidParam {
        strategy: cfg.name.clone(),
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Floats accept integer literals too, so `multiplier = 2` works.
fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}

/// Negative integers fall back to 0 so the strategy reports the window as invalid.
fn param_usize(params: &HashMap<String, toml::Value>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.as_integer())
        .map(|v| usize::try_from(v).unwrap_or(0))
        .unwrap_or(default)
}

fn param_i64(params: &HashMap<String, toml::Value>, key: &str, default: i64) -> i64 {
    params
        .get(key)
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn param_str<'a>(params: &'a HashMap<String, toml::Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn required_str<'a>(cfg: &'a StrategyConfig, key: &str) -> Result<&'a str> {
    param_str(&cfg.params, key).ok_or_else(|| invalid(cfg, key, "required string"))
}
