pub mod beta;
pub mod bollinger;
pub mod candlestick;
pub mod factor;
pub mod keltner;
pub mod klinger;
pub mod momentum;
pub mod pairs;
pub mod revision;
pub mod twap;
pub mod volume_profile;

pub use beta::BettingAgainstBeta;
pub use bollinger::BollingerReversion;
pub use candlestick::CandlestickPatterns;
pub use factor::{
    EarningsYield, EarningsYieldStrategy, Factor, FactorStrategy, PriceToSales,
    PriceToSalesStrategy, QualityGrowth, QualityGrowthStrategy,
};
pub use keltner::KeltnerChannel;
pub use klinger::KlingerOscillator;
pub use momentum::AcceleratingMomentum;
pub use pairs::PairsTrading;
pub use revision::RevisionMomentum;
pub use twap::TwapExecution;
pub use volume_profile::VolumeProfile;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::MarketBar;

    fn day(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap() + Duration::days(i as i64)
    }

    pub fn bar(symbol: &str, i: usize, open: f64, high: f64, low: f64, close: f64, volume: u64) -> MarketBar {
        MarketBar::new(symbol, day(i), open, high, low, close, volume)
    }

    pub fn flat(symbol: &str, i: usize, price: f64) -> MarketBar {
        MarketBar::flat(symbol, day(i), price, 1_000)
    }

    pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<MarketBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| flat(symbol, i, c))
            .collect()
    }
}
