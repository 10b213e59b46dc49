use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::Strategy;

pub const TWAP_SLICE_CONFIDENCE: f64 = 0.80;
pub const TWAP_URGENT_CONFIDENCE: f64 = 0.95;
pub const DEFAULT_TWAP_TOLERANCE: f64 = 0.10;

/// Progress of one symbol's schedule.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    started_at: DateTime<Utc>,
    /// Position held when the schedule saw its first bar.
    baseline: Option<i64>,
}

/// Time-weighted execution pacing.
///
/// Each symbol's schedule starts at its first bar (or an explicit start
/// time). Executed volume is the distance of the portfolio position from
/// the position held at the schedule's first bar, so holdings that predate
/// the schedule never count as executed. Elapsed time is measured to the
/// bar timestamp.
pub struct TwapExecution {
    name: String,
    target_volume: u64,
    duration: Duration,
    slices: u32,
    tolerance: f64,
    schedules: HashMap<String, Schedule>,
    config_error: Option<String>,
}

impl TwapExecution {
    pub fn new(target_volume: u64, duration: Duration, slices: u32) -> Self {
        Self::with_tolerance(target_volume, duration, slices, DEFAULT_TWAP_TOLERANCE)
    }

    pub fn with_tolerance(target_volume: u64, duration: Duration, slices: u32, tolerance: f64) -> Self {
        let config_error = if target_volume == 0 {
            Some("Invalid TWAP target volume: 0 (must be > 0)".to_string())
        } else if duration <= Duration::zero() {
            Some(format!(
                "Invalid TWAP duration: {}s (must be > 0)",
                duration.num_seconds()
            ))
        } else if slices == 0 {
            Some("Invalid TWAP slices: 0 (must be >= 1)".to_string())
        } else if !(0.0..1.0).contains(&tolerance) {
            Some(format!("Invalid TWAP tolerance: {tolerance} (must be in [0, 1))"))
        } else {
            None
        };
        if let Some(problem) = &config_error {
            warn!(%problem, "TwapExecution misconfigured");
        }

        Self {
            name: "TWAP Execution".to_string(),
            target_volume,
            duration,
            slices,
            tolerance,
            schedules: HashMap::new(),
            config_error,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the schedule start for `symbol`. Used to resume a schedule
    /// that began before this instance saw its first bar, and by tests.
    /// The opening position is still taken from the next bar.
    pub fn set_start_time(&mut self, symbol: impl Into<String>, started_at: DateTime<Utc>) {
        self.schedules.insert(
            symbol.into(),
            Schedule {
                started_at,
                baseline: None,
            },
        );
    }

    pub fn start_time(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.schedules.get(symbol).map(|s| s.started_at)
    }

    /// Volume executed for `symbol` since its schedule started.
    pub fn executed_volume(&self, symbol: &str, position: i64) -> u64 {
        self.schedules
            .get(symbol)
            .and_then(|s| s.baseline)
            .map_or(0, |baseline| position.abs_diff(baseline))
    }

    fn slice_size(&self) -> u64 {
        self.target_volume.div_ceil(u64::from(self.slices))
    }
}

impl Strategy for TwapExecution {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Intraday
    }

    fn reset(&mut self) {
        self.schedules.clear();
    }

    fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let position = portfolio.position(&bar.symbol);
        let schedule = self
            .schedules
            .entry(bar.symbol.clone())
            .or_insert(Schedule {
                started_at: bar.timestamp,
                baseline: None,
            });
        let baseline = *schedule.baseline.get_or_insert(position);
        let started_at = schedule.started_at;

        let executed = position.abs_diff(baseline);
        if executed >= self.target_volume {
            return TradeSignal::neutral(format!(
                "TWAP complete: {executed}/{} executed",
                self.target_volume
            ));
        }
        let remaining = self.target_volume - executed;

        let elapsed = (bar.timestamp - started_at).max(Duration::zero());
        if elapsed >= self.duration {
            debug!(strategy = %self.name, symbol = %bar.symbol, remaining, "TWAP window elapsed");
            return TradeSignal::long(
                TWAP_URGENT_CONFIDENCE,
                format!("TWAP urgent completion: window elapsed with {remaining} remaining"),
            );
        }

        let expected = elapsed.num_milliseconds() as f64 / self.duration.num_milliseconds() as f64;
        let done = executed as f64 / self.target_volume as f64;
        if expected - done > self.tolerance {
            let slice = self.slice_size().min(remaining);
            return TradeSignal::long(
                TWAP_SLICE_CONFIDENCE,
                format!(
                    "TWAP slice of {slice}: executed {:.0}% vs expected {:.0}%",
                    done * 100.0,
                    expected * 100.0
                ),
            );
        }

        TradeSignal::neutral(format!(
            "TWAP on pace: executed {:.0}% vs expected {:.0}%",
            done * 100.0,
            expected * 100.0
        ))
    }

    fn history_len(&self, symbol: &str) -> usize {
        usize::from(self.schedules.contains_key(symbol))
    }

    fn history_capacity(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Direction, InMemoryPortfolio};

    fn bar_at(timestamp: DateTime<Utc>) -> MarketBar {
        MarketBar::flat("MSFT", timestamp, 400.0, 1_000)
    }

    /// Open a 1,000-share, 10-minute schedule at `start` with `opening` shares held.
    fn opened(start: DateTime<Utc>, opening: i64) -> TwapExecution {
        let mut strategy = TwapExecution::new(1_000, Duration::minutes(10), 10);
        let book = InMemoryPortfolio::new().with_position("MSFT", opening);
        strategy.evaluate(&book, Some(&bar_at(start)));
        strategy
    }

    #[test]
    fn first_bar_starts_schedule_on_pace() {
        let mut strategy = TwapExecution::new(1_000, Duration::minutes(10), 10);
        let now = Utc::now();
        let signal = strategy.evaluate(&InMemoryPortfolio::new(), Some(&bar_at(now)));
        assert_eq!(signal.direction(), Direction::Neutral);
        assert!(signal.reason().contains("on pace"));
        assert_eq!(strategy.start_time("MSFT"), Some(now));
    }

    #[test]
    fn on_schedule_execution_is_neutral() {
        let start = Utc::now();
        let mut strategy = opened(start, 0);
        let portfolio = InMemoryPortfolio::new().with_position("MSFT", 480);
        let signal = strategy.evaluate(&portfolio, Some(&bar_at(start + Duration::minutes(5))));
        assert!(signal.reason().contains("on pace"));
    }

    #[test]
    fn lagging_schedule_emits_slice() {
        let start = Utc::now();
        let mut strategy = opened(start, 0);
        let portfolio = InMemoryPortfolio::new().with_position("MSFT", 200);
        let signal = strategy.evaluate(&portfolio, Some(&bar_at(start + Duration::minutes(5))));
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.confidence(), TWAP_SLICE_CONFIDENCE);
        assert!(signal.reason().contains("slice of 100"));
    }

    #[test]
    fn completed_target_is_neutral() {
        let start = Utc::now();
        let mut strategy = opened(start, 0);
        let portfolio = InMemoryPortfolio::new().with_position("MSFT", -1_000);
        let signal = strategy.evaluate(&portfolio, Some(&bar_at(start + Duration::minutes(30))));
        assert!(signal.reason().contains("TWAP complete"));
    }

    #[test]
    fn opening_position_is_not_executed_volume() {
        let start = Utc::now();
        let mut strategy = opened(start, 1_000);
        let unchanged = InMemoryPortfolio::new().with_position("MSFT", 1_000);
        let signal = strategy.evaluate(&unchanged, Some(&bar_at(start + Duration::minutes(5))));
        assert_eq!(signal.direction(), Direction::Long);
        assert!(!signal.reason().contains("TWAP complete"));
        assert_eq!(strategy.executed_volume("MSFT", 1_000), 0);

        let traded = InMemoryPortfolio::new().with_position("MSFT", 1_500);
        let signal = strategy.evaluate(&traded, Some(&bar_at(start + Duration::minutes(5))));
        assert!(signal.reason().contains("on pace"));
        assert_eq!(strategy.executed_volume("MSFT", 1_500), 500);
    }

    #[test]
    fn reset_forgets_opening_position() {
        let start = Utc::now();
        let mut strategy = opened(start, 1_000);
        strategy.reset();
        assert_eq!(strategy.history_len("MSFT"), 0);

        let flat_book = InMemoryPortfolio::new();
        strategy.evaluate(&flat_book, Some(&bar_at(start)));
        assert_eq!(strategy.executed_volume("MSFT", 300), 300);
    }

    #[test]
    fn zero_duration_is_invalid() {
        let mut strategy = TwapExecution::new(1_000, Duration::zero(), 10);
        let signal = strategy.evaluate(&InMemoryPortfolio::new(), Some(&bar_at(Utc::now())));
        assert!(signal.reason().contains("Invalid TWAP duration"));
        assert_eq!(strategy.history_len("MSFT"), 0);
    }
}
