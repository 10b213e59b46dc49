use std::sync::Arc;

use tracing::{debug, warn};

use common::{
    FundamentalData, FundamentalsProvider, MarketBar, NoFundamentals, Portfolio, StrategyType,
    TradeSignal,
};

use crate::history::SymbolHistory;
use crate::indicators::{vwap, Candle};
use crate::scoring::{composite, earnings_yield, growth_rate, CompositeScore};
use crate::{warming_up, Strategy};

/// Confidence when the decision rests on reported fundamentals.
pub const REAL_METRICS_CONFIDENCE: f64 = 0.80;
/// Confidence when the decision rests on a price/volume proxy.
pub const PROXY_CONFIDENCE: f64 = 0.70;
/// A held position exits once its metric is this many times worse than the entry threshold.
pub const EXIT_DEGRADATION: f64 = 1.5;

/// One fundamental factor: how to read it from a snapshot and how to
/// approximate it from price history when no snapshot is usable.
pub trait Factor: Send + Sync {
    /// Short label used in reasons, e.g. `E/P`.
    fn label(&self) -> &'static str;

    /// Whether larger metric values are more attractive.
    fn higher_is_better(&self) -> bool;

    fn real_metric(&self, data: &FundamentalData, close: f64) -> Option<f64>;

    fn proxy_metric(&self, candles: &[Candle], threshold: f64) -> Option<f64>;
}

/// Earnings yield (E/P). Proxy: trailing return over the lookback.
#[derive(Debug, Clone, Copy, Default)]
pub struct EarningsYield;

impl Factor for EarningsYield {
    fn label(&self) -> &'static str {
        "E/P"
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn real_metric(&self, data: &FundamentalData, close: f64) -> Option<f64> {
        earnings_yield(data, close)
    }

    fn proxy_metric(&self, candles: &[Candle], _threshold: f64) -> Option<f64> {
        let first = candles.first()?.close;
        let last = candles.last()?.close;
        (first > 0.0).then(|| last / first - 1.0)
    }
}

/// Price-to-sales, derived as P/E times net margin.
/// Proxy: the threshold scaled by how far price sits from VWAP.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceToSales;

impl Factor for PriceToSales {
    fn label(&self) -> &'static str {
        "P/S"
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn real_metric(&self, data: &FundamentalData, _close: f64) -> Option<f64> {
        let pe = data.pe_ratio.filter(|v| v.is_finite())?;
        let margin = data.net_margin.filter(|v| v.is_finite())?;
        Some(pe * margin)
    }

    fn proxy_metric(&self, candles: &[Candle], threshold: f64) -> Option<f64> {
        let last = candles.last()?.close;
        let average = vwap(candles)?;
        Some(threshold * last / average)
    }
}

/// Revenue/earnings growth. Proxy: VWAP of the recent half of the window
/// against VWAP of the older half.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGrowth;

impl Factor for QualityGrowth {
    fn label(&self) -> &'static str {
        "growth"
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn real_metric(&self, data: &FundamentalData, _close: f64) -> Option<f64> {
        growth_rate(data)
    }

    fn proxy_metric(&self, candles: &[Candle], _threshold: f64) -> Option<f64> {
        let (older, recent) = candles.split_at(candles.len() / 2);
        let older = vwap(older)?;
        let recent = vwap(recent)?;
        Some(recent / older - 1.0)
    }
}

/// Long-only factor strategy backed by fundamentals with a proxy fallback.
pub struct FactorStrategy<F: Factor> {
    name: String,
    factor: F,
    threshold: f64,
    lookback: usize,
    provider: Arc<dyn FundamentalsProvider>,
    candles: SymbolHistory<Candle>,
    config_error: Option<String>,
}

pub type EarningsYieldStrategy = FactorStrategy<EarningsYield>;
pub type PriceToSalesStrategy = FactorStrategy<PriceToSales>;
pub type QualityGrowthStrategy = FactorStrategy<QualityGrowth>;

impl EarningsYieldStrategy {
    /// Buy when earnings yield is at least `min_yield`.
    pub fn earnings_yield(min_yield: f64, lookback: usize) -> Self {
        FactorStrategy::new("Earnings Yield", EarningsYield, min_yield, lookback)
    }
}

impl PriceToSalesStrategy {
    /// Buy when price-to-sales is at most `max_ps`.
    pub fn price_to_sales(max_ps: f64, lookback: usize) -> Self {
        FactorStrategy::new("Price To Sales", PriceToSales, max_ps, lookback)
    }
}

impl QualityGrowthStrategy {
    /// Buy when growth is at least `min_growth`.
    pub fn quality_growth(min_growth: f64, lookback: usize) -> Self {
        FactorStrategy::new("Quality Growth", QualityGrowth, min_growth, lookback)
    }
}

enum Source {
    Real(CompositeScore),
    Proxy,
}

impl<F: Factor> FactorStrategy<F> {
    pub fn new(name: impl Into<String>, factor: F, threshold: f64, lookback: usize) -> Self {
        let name = name.into();
        let config_error = if !(threshold.is_finite() && threshold > 0.0) {
            Some(format!("Invalid {} threshold: {threshold} (must be > 0)", factor.label()))
        } else if lookback < 2 {
            Some(format!("Invalid {} lookback: {lookback} (must be >= 2)", factor.label()))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, strategy = %name, "factor strategy misconfigured");
        }

        Self {
            name,
            factor,
            threshold,
            lookback,
            provider: Arc::new(NoFundamentals),
            candles: SymbolHistory::new(lookback),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn FundamentalsProvider>) -> Self {
        self.provider = provider;
        self
    }

    fn passes(&self, metric: f64) -> bool {
        if self.factor.higher_is_better() {
            metric >= self.threshold
        } else {
            metric >= 0.0 && metric <= self.threshold
        }
    }

    fn degraded(&self, metric: f64) -> bool {
        metric < 0.0
            || if self.factor.higher_is_better() {
                metric < self.threshold / EXIT_DEGRADATION
            } else {
                metric > self.threshold * EXIT_DEGRADATION
            }
    }

    /// Metric from reported fundamentals when they are usable.
    fn real(&self, symbol: &str, close: f64) -> Option<(f64, CompositeScore)> {
        let data = self.provider.lookup(symbol)?;
        let score = composite(&data, close)?;
        let metric = self.factor.real_metric(&data, close)?;
        metric.is_finite().then_some((metric, score))
    }
}

impl<F: Factor> Strategy for FactorStrategy<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::LongTerm
    }

    fn reset(&mut self) {
        self.candles.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let window = self.candles.push(&bar.symbol, Candle::from(bar));
        if window.len() < self.lookback {
            return warming_up(window.len(), self.lookback);
        }
        let candles = window.to_vec();
        let label = self.factor.label();

        let (metric, source) = match self.real(&bar.symbol, bar.close) {
            Some((metric, score)) => (metric, Source::Real(score)),
            None => match self.factor.proxy_metric(&candles, self.threshold) {
                Some(metric) if metric.is_finite() => (metric, Source::Proxy),
                _ => {
                    return TradeSignal::neutral(format!(
                        "Insufficient data for {label} proxy"
                    ))
                }
            },
        };

        let (confidence, basis) = match &source {
            Source::Real(score) => (
                REAL_METRICS_CONFIDENCE,
                format!(
                    "real {label} (real metrics: composite {:.2} from {} metrics)",
                    score.score, score.metrics
                ),
            ),
            Source::Proxy => (PROXY_CONFIDENCE, format!("{label} proxy from price history")),
        };

        let position = portfolio.position(&bar.symbol);
        if position > 0 {
            if self.degraded(metric) {
                debug!(strategy = %self.name, symbol = %bar.symbol, metric, "factor degraded");
                return TradeSignal::exit(
                    position,
                    confidence,
                    format!("{label} {metric:.4} degraded past exit level; {basis}"),
                );
            }
            return TradeSignal::neutral(format!("Holding: {label} {metric:.4}; {basis}"));
        }
        if position < 0 {
            return TradeSignal::neutral(format!("Short position held; {label} {metric:.4} not traded"));
        }

        if !self.passes(metric) {
            return TradeSignal::neutral(format!(
                "{label} {metric:.4} does not meet {:.4}; {basis}",
                self.threshold
            ));
        }
        if let Source::Real(score) = &source {
            if score.score < 0.0 {
                return TradeSignal::neutral(format!(
                    "{label} {metric:.4} passes but composite quality {:.2} is negative; {basis}",
                    score.score
                ));
            }
        }

        let cmp = if self.factor.higher_is_better() { ">=" } else { "<=" };
        TradeSignal::long(
            confidence,
            format!("{label} {metric:.4} {cmp} {:.4}; {basis}", self.threshold),
        )
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.candles.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.candles.capacity()
    }
}
