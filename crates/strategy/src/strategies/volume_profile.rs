use tracing::warn;

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::history::SymbolHistory;
use crate::indicators::{mean, Candle};
use crate::{warming_up, Strategy};

pub const PROFILE_ENTRY_CONFIDENCE: f64 = 0.65;
pub const PROFILE_EXIT_CONFIDENCE: f64 = 0.65;
pub const WEAK_BREAKOUT_CONFIDENCE: f64 = 0.60;
/// Share of bins, from each edge, treated as the low/high edge of the profile.
const EDGE_FRACTION: f64 = 0.3;
/// Bin volume relative to the mean bin that marks a high-volume node.
const HIGH_VOLUME_FACTOR: f64 = 1.2;

/// Volume-at-price histogram of the prior `lookback` bars.
struct Profile {
    low: f64,
    high: f64,
    bins: Vec<f64>,
    mean_bar_volume: f64,
}

impl Profile {
    fn build(candles: &[Candle], bin_count: usize) -> Option<Self> {
        let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        if !(high - low > 0.0) {
            return None;
        }

        let mut bins = vec![0.0; bin_count];
        let width = (high - low) / bin_count as f64;
        for candle in candles {
            let idx = ((candle.close - low) / width) as usize;
            bins[idx.min(bin_count - 1)] += candle.volume;
        }
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        Some(Self {
            low,
            high,
            bins,
            mean_bar_volume: mean(&volumes).unwrap_or(0.0),
        })
    }

    fn bin_of(&self, price: f64) -> usize {
        let width = (self.high - self.low) / self.bins.len() as f64;
        (((price - self.low) / width) as usize).min(self.bins.len() - 1)
    }

    fn is_high_volume(&self, bin: usize) -> bool {
        let mean_bin = self.bins.iter().sum::<f64>() / self.bins.len() as f64;
        mean_bin > 0.0 && self.bins[bin] >= HIGH_VOLUME_FACTOR * mean_bin
    }
}

/// Trades support and resistance implied by where volume traded.
///
/// The current bar is judged against the profile of the bars before it and
/// then recorded.
pub struct VolumeProfile {
    name: String,
    lookback: usize,
    bins: usize,
    candles: SymbolHistory<Candle>,
    config_error: Option<String>,
}

impl VolumeProfile {
    pub fn new(lookback: usize, bins: usize) -> Self {
        let config_error = if lookback < 2 {
            Some(format!("Invalid volume profile lookback: {lookback} (must be >= 2)"))
        } else if bins < 2 {
            Some(format!("Invalid volume profile bins: {bins} (must be >= 2)"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "VolumeProfile misconfigured");
        }

        Self {
            name: "Volume Profile".to_string(),
            lookback,
            bins,
            candles: SymbolHistory::new(lookback),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn edge_bins(&self) -> usize {
        ((self.bins as f64 * EDGE_FRACTION).ceil() as usize).max(1)
    }

    fn judge(&self, portfolio: &dyn Portfolio, bar: &MarketBar, prior: &[Candle]) -> TradeSignal {
        let Some(profile) = Profile::build(prior, self.bins) else {
            return TradeSignal::neutral("Insufficient price range for volume profile");
        };
        let close = bar.close;
        let volume = bar.volume as f64;
        let position = portfolio.position(&bar.symbol);

        if close > profile.high {
            if volume < profile.mean_bar_volume {
                return TradeSignal::short(
                    WEAK_BREAKOUT_CONFIDENCE,
                    format!(
                        "Weak breakout above {:.2} on below-average volume ({volume:.0} < {:.0})",
                        profile.high, profile.mean_bar_volume
                    ),
                );
            }
            return TradeSignal::neutral(format!("Breakout above {:.2} confirmed by volume", profile.high));
        }
        if close < profile.low {
            return TradeSignal::neutral(format!("Price {close:.2} below profile range {:.2}", profile.low));
        }

        let bin = profile.bin_of(close);
        let edge = self.edge_bins();
        let high_volume = profile.is_high_volume(bin);

        if bin < edge && high_volume && position == 0 {
            TradeSignal::long(
                PROFILE_ENTRY_CONFIDENCE,
                format!("Volume profile buy: {close:.2} at high-volume support (bin {bin})"),
            )
        } else if bin >= self.bins - edge && high_volume && position > 0 {
            TradeSignal::exit(
                position,
                PROFILE_EXIT_CONFIDENCE,
                format!("Volume profile sell: {close:.2} at high-volume resistance (bin {bin})"),
            )
        } else {
            TradeSignal::neutral(format!("Price {close:.2} in volume profile bin {bin}"))
        }
    }
}

impl Strategy for VolumeProfile {
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

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let prior = self
            .candles
            .get(&bar.symbol)
            .map(|w| w.to_vec())
            .unwrap_or_default();

        let signal = if prior.len() < self.lookback {
            warming_up(prior.len() + 1, self.lookback + 1)
        } else {
            self.judge(portfolio, bar, &prior)
        };

        self.candles.push(&bar.symbol, Candle::from(bar));
        signal
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.candles.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.candles.capacity()
    }
}
