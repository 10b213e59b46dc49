use chrono::{DateTime, Duration, TimeZone, Utc};

use common::{Direction, InMemoryPortfolio, MarketBar, TradeSignal};
use strategy::{
    AcceleratingMomentum, BettingAgainstBeta, BollingerReversion, PairsTrading, Strategy,
    TwapExecution,
};

fn session_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap()
}

fn close_bar(symbol: &str, i: usize, close: f64) -> MarketBar {
    MarketBar::flat(symbol, session_open() + Duration::minutes(i as i64), close, 1_000)
}

fn feed(strategy: &mut dyn Strategy, symbol: &str, closes: &[f64]) -> TradeSignal {
    let portfolio = InMemoryPortfolio::new();
    let mut last = TradeSignal::neutral("nothing fed");
    for (i, &close) in closes.iter().enumerate() {
        last = strategy.evaluate(&portfolio, Some(&close_bar(symbol, i, close)));
    }
    last
}

#[test]
fn accelerating_momentum_goes_long() {
    let mut strategy = AcceleratingMomentum::new(2, 2);
    let signal = feed(&mut strategy, "AAPL", &[100.0, 101.0, 105.0, 112.0]);
    assert_eq!(signal.direction(), Direction::Long);
    assert!(signal.confidence() > 0.5);
    assert!(!signal.is_exit());
}

fn oscillating_near_22000() -> Vec<f64> {
    (0..20).map(|i| if i % 2 == 0 { 21995.0 } else { 22005.0 }).collect()
}

#[test]
fn bollinger_oversold_is_long() {
    let mut strategy = BollingerReversion::new(20, 2.0);
    let mut closes = oscillating_near_22000();
    closes.push(21700.0);
    let signal = feed(&mut strategy, "NQ", &closes);
    assert_eq!(signal.direction(), Direction::Long);
    assert!(signal.confidence() > 0.65);
    assert!(signal.reason().contains("oversold"));
}

#[test]
fn bollinger_overbought_is_short() {
    let mut strategy = BollingerReversion::new(20, 2.0);
    let mut closes = oscillating_near_22000();
    closes.push(22300.0);
    let signal = feed(&mut strategy, "NQ", &closes);
    assert_eq!(signal.direction(), Direction::Short);
    assert!(signal.confidence() > 0.65);
    assert!(signal.reason().contains("overbought"));
}

fn pair_bar(strategy: &mut PairsTrading, i: usize, a: f64, b: f64) -> TradeSignal {
    let portfolio = InMemoryPortfolio::new();
    strategy.evaluate(&portfolio, Some(&close_bar("A", i, a)));
    strategy.evaluate(&portfolio, Some(&close_bar("B", i, b)))
}

#[test]
fn pairs_ratio_extremes() {
    let mut strategy = PairsTrading::new("A", "B", 30, 2.0);
    for i in 0..30 {
        pair_bar(&mut strategy, i, 500.0, 100.0);
    }

    let cheap = pair_bar(&mut strategy, 30, 440.0, 100.0);
    assert_eq!(cheap.direction(), Direction::Long);
    assert_eq!(cheap.confidence(), 0.7);
    assert!(cheap.reason().contains("undervalued"));

    let rich = pair_bar(&mut strategy, 31, 560.0, 100.0);
    assert_eq!(rich.direction(), Direction::Short);
    assert_eq!(rich.confidence(), 0.7);
    assert!(rich.reason().contains("overvalued"));
}

#[test]
fn pairs_leg_arriving_alone_does_not_signal() {
    let mut strategy = PairsTrading::new("A", "B", 30, 2.0);
    for i in 0..30 {
        pair_bar(&mut strategy, i, 500.0, 100.0);
    }

    let portfolio = InMemoryPortfolio::new();
    let lone = strategy.evaluate(&portfolio, Some(&close_bar("A", 30, 550.0)));
    assert_eq!(lone.direction(), Direction::Neutral);
    let completed = strategy.evaluate(&portfolio, Some(&close_bar("B", 30, 110.0)));
    assert_eq!(completed.direction(), Direction::Neutral);
    assert!(!completed.reason().contains("overvalued"));
}

#[test]
fn beta_is_independent_of_bar_arrival_order() {
    let portfolio = InMemoryPortfolio::new();
    let mut outcomes = Vec::new();
    for asset_first in [false, true] {
        let mut strategy = BettingAgainstBeta::new("SPY", 6);
        let (mut market, mut asset) = (480.0, 60.0);
        let mut last = TradeSignal::neutral("nothing fed");
        for i in 0..12 {
            let r = if i % 3 == 0 { 0.012 } else { -0.005 };
            market *= 1.0 + r;
            asset *= 1.0 + 2.0 * r;
            let market_bar = close_bar("SPY", i, market);
            let asset_bar = close_bar("KO", i, asset);
            if asset_first {
                last = strategy.evaluate(&portfolio, Some(&asset_bar));
                strategy.evaluate(&portfolio, Some(&market_bar));
            } else {
                strategy.evaluate(&portfolio, Some(&market_bar));
                last = strategy.evaluate(&portfolio, Some(&asset_bar));
            }
        }
        outcomes.push(last);
    }
    for signal in &outcomes {
        assert_eq!(signal.direction(), Direction::Short);
        assert!(signal.reason().contains("High beta 2.00"));
    }
}

#[test]
fn twap_behind_schedule_slices() {
    let mut strategy = TwapExecution::new(10_000, Duration::minutes(10), 10);
    let now = Utc::now();
    strategy.set_start_time("MSFT", now - Duration::minutes(5));
    let signal = strategy.evaluate(
        &InMemoryPortfolio::new(),
        Some(&MarketBar::flat("MSFT", now, 410.0, 5_000)),
    );
    assert_eq!(signal.direction(), Direction::Long);
    assert!((0.79..=0.81).contains(&signal.confidence()));
}

#[test]
fn twap_past_window_is_urgent() {
    let mut strategy = TwapExecution::new(10_000, Duration::minutes(10), 10);
    let now = Utc::now();
    strategy.set_start_time("MSFT", now - Duration::minutes(15));
    let signal = strategy.evaluate(
        &InMemoryPortfolio::new(),
        Some(&MarketBar::flat("MSFT", now, 410.0, 5_000)),
    );
    assert_eq!(signal.direction(), Direction::Long);
    assert!(signal.confidence() > 0.9);
}

#[test]
fn invalid_beta_window_is_permanently_neutral() {
    let mut strategy = BettingAgainstBeta::new("SPY", 1);
    let portfolio = InMemoryPortfolio::new().with_position("KO", 10);
    let inputs = [
        Some(close_bar("SPY", 0, 480.0)),
        Some(close_bar("KO", 0, 60.0)),
        Some(close_bar("SPY", 1, 490.0)),
        Some(close_bar("KO", 1, 61.0)),
    ];
    for bar in &inputs {
        let signal = strategy.evaluate(&portfolio, bar.as_ref());
        assert_eq!(signal.direction(), Direction::Neutral);
        assert!(signal.reason().contains("Invalid beta window"));
    }
}

#[test]
fn missing_bar_is_neutral_without_mutation() {
    let mut strategy = AcceleratingMomentum::new(2, 2);
    let portfolio = InMemoryPortfolio::new();
    strategy.evaluate(&portfolio, Some(&close_bar("AAPL", 0, 100.0)));

    let signal = strategy.evaluate(&portfolio, None);
    assert_eq!(signal.direction(), Direction::Neutral);
    assert_eq!(strategy.history_len("AAPL"), 1);
}

#[test]
fn invalid_bar_is_neutral_without_mutation() {
    let mut strategy = BollingerReversion::new(10, 2.0);
    let bad = MarketBar::flat("ES", session_open(), f64::INFINITY, 10);
    let signal = strategy.evaluate(&InMemoryPortfolio::new(), Some(&bad));
    assert!(signal.reason().contains("Invalid bar"));
    assert_eq!(strategy.history_len("ES"), 0);
}

#[test]
fn warm_up_records_bars() {
    let mut strategy = BollingerReversion::new(20, 2.0);
    let signal = feed(&mut strategy, "ES", &[5000.0, 5001.0, 4999.0]);
    assert!(signal.reason().contains("Warming up"));
    assert_eq!(strategy.history_len("ES"), 3);
}
