use common::{MarketBar, Portfolio, StrategyType, TradeSignal};

use crate::history::SymbolHistory;
use crate::indicators::Candle;
use crate::{warming_up, Strategy};

pub const ENGULFING_CONFIDENCE: f64 = 0.70;
pub const STAR_CONFIDENCE: f64 = 0.75;
/// A star's middle body must be smaller than this share of the first body.
const STAR_BODY_RATIO: f64 = 0.3;
const PATTERN_BARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    MorningStar,
    EveningStar,
    BullishEngulfing,
    BearishEngulfing,
}

/// Three-bar star patterns, checked before two-bar engulfing.
fn detect(first: &Candle, middle: &Candle, last: &Candle) -> Option<Pattern> {
    let star_body = first.body() > 0.0 && middle.body() < STAR_BODY_RATIO * first.body();

    if star_body
        && first.is_bearish()
        && middle.body_top() < first.close
        && last.is_bullish()
        && last.close > first.midpoint()
    {
        return Some(Pattern::MorningStar);
    }
    if star_body
        && first.is_bullish()
        && middle.body_bottom() > first.close
        && last.is_bearish()
        && last.close < first.midpoint()
    {
        return Some(Pattern::EveningStar);
    }

    let engulfs = last.body() > middle.body()
        && last.body_top() >= middle.body_top()
        && last.body_bottom() <= middle.body_bottom();
    if engulfs && middle.is_bearish() && last.is_bullish() {
        return Some(Pattern::BullishEngulfing);
    }
    if engulfs && middle.is_bullish() && last.is_bearish() {
        return Some(Pattern::BearishEngulfing);
    }
    None
}

/// Candlestick reversal patterns over the last three bars.
pub struct CandlestickPatterns {
    name: String,
    candles: SymbolHistory<Candle>,
}

impl CandlestickPatterns {
    pub fn new() -> Self {
        Self {
            name: "Candlestick Patterns".to_string(),
            candles: SymbolHistory::new(PATTERN_BARS),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for CandlestickPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for CandlestickPatterns {
    fn name(&self) -> &str {
        &self.name
    }

    fn classification(&self) -> StrategyType {
        StrategyType::Intraday
    }

    fn reset(&mut self) {
        self.candles.clear();
    }

    fn on_bar(&mut self, portfolio: &dyn Portfolio, bar: &MarketBar) -> TradeSignal {
        let window = self.candles.push(&bar.symbol, Candle::from(bar));
        let (Some(first), Some(middle), Some(last)) = (window.back(2), window.back(1), window.back(0))
        else {
            return warming_up(window.len(), PATTERN_BARS);
        };

        let position = portfolio.position(&bar.symbol);
        match detect(first, middle, last) {
            Some(Pattern::MorningStar) if position <= 0 => TradeSignal::long(
                STAR_CONFIDENCE,
                "Morning star: gap-down star followed by recovery above first bar midpoint",
            ),
            Some(Pattern::EveningStar) if position >= 0 => TradeSignal::short(
                STAR_CONFIDENCE,
                "Evening star: gap-up star followed by decline below first bar midpoint",
            ),
            Some(Pattern::BullishEngulfing) if position <= 0 => TradeSignal::long(
                ENGULFING_CONFIDENCE,
                "Bullish engulfing: bullish body engulfs prior bearish body",
            ),
            Some(Pattern::BearishEngulfing) if position >= 0 => TradeSignal::short(
                ENGULFING_CONFIDENCE,
                "Bearish engulfing: bearish body engulfs prior bullish body",
            ),
            Some(pattern) => {
                TradeSignal::neutral(format!("{pattern:?} ignored: already positioned {position}"))
            }
            None => TradeSignal::neutral("No candlestick pattern"),
        }
    }

    fn history_len(&self, symbol: &str) -> usize {
        self.candles.len(symbol)
    }

    fn history_capacity(&self) -> usize {
        self.candles.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::bar;
    use common::{Direction, InMemoryPortfolio};

    fn run(strategy: &mut CandlestickPatterns, portfolio: &InMemoryPortfolio, ohlc: &[(f64, f64, f64, f64)]) -> TradeSignal {
        let mut last = TradeSignal::neutral("none");
        for (i, &(o, h, l, c)) in ohlc.iter().enumerate() {
            last = strategy.evaluate(portfolio, Some(&bar("NVDA", i, o, h, l, c, 1_000)));
        }
        last
    }

    #[test]
    fn fewer_than_three_bars_warm_up() {
        let mut strategy = CandlestickPatterns::new();
        let signal = run(&mut strategy, &InMemoryPortfolio::new(), &[(10.0, 11.0, 9.0, 10.5), (10.5, 11.0, 9.5, 9.8)]);
        assert!(signal.reason().contains("Warming up"));
    }

    #[test]
    fn bullish_engulfing_is_long() {
        let mut strategy = CandlestickPatterns::new();
        let signal = run(
            &mut strategy,
            &InMemoryPortfolio::new(),
            &[(100.0, 101.0, 99.0, 100.5), (100.0, 100.2, 98.9, 99.0), (98.8, 101.5, 98.5, 101.2)],
        );
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.confidence(), ENGULFING_CONFIDENCE);
        assert!(signal.reason().contains("Bullish engulfing"));
    }

    #[test]
    fn bearish_engulfing_is_short() {
        let mut strategy = CandlestickPatterns::new();
        let signal = run(
            &mut strategy,
            &InMemoryPortfolio::new(),
            &[(100.0, 101.0, 99.0, 99.5), (99.0, 100.3, 98.9, 100.0), (100.4, 100.6, 98.0, 98.5)],
        );
        assert_eq!(signal.direction(), Direction::Short);
    }

    #[test]
    fn engulfing_suppressed_when_already_long() {
        let mut strategy = CandlestickPatterns::new();
        let portfolio = InMemoryPortfolio::new().with_position("NVDA", 10);
        let signal = run(
            &mut strategy,
            &portfolio,
            &[(100.0, 101.0, 99.0, 100.5), (100.0, 100.2, 98.9, 99.0), (98.8, 101.5, 98.5, 101.2)],
        );
        assert_eq!(signal.direction(), Direction::Neutral);
        assert!(signal.reason().contains("already positioned"));
    }

    #[test]
    fn morning_star_is_long() {
        let mut strategy = CandlestickPatterns::new();
        let signal = run(
            &mut strategy,
            &InMemoryPortfolio::new(),
            &[(110.0, 110.5, 99.5, 100.0), (98.0, 98.8, 97.0, 98.3), (98.5, 107.0, 98.4, 106.0)],
        );
        assert_eq!(signal.direction(), Direction::Long);
        assert_eq!(signal.confidence(), STAR_CONFIDENCE);
        assert!(signal.reason().contains("Morning star"));
    }
}
