use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Bar interval tag. Strategies never resample; the tag is carried through
/// for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[default]
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
        };
        write!(f, "{tag}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Equity,
    Crypto,
    Future,
    Forex,
    Option,
}

/// One OHLCV observation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub timeframe: Timeframe,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default)]
    pub asset_type: AssetType,
}

impl MarketBar {
    /// Daily equity bar with explicit OHLCV values.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            timeframe: Timeframe::default(),
            open,
            high,
            low,
            close,
            volume,
            asset_type: AssetType::default(),
        }
    }

    /// Flat bar where open, high, low and close are all `price`.
    pub fn flat(symbol: impl Into<String>, timestamp: DateTime<Utc>, price: f64, volume: u64) -> Self {
        Self::new(symbol, timestamp, price, price, price, price, volume)
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }

    /// Prices are finite and positive and the high/low envelope is ordered.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.high >= self.low
            && !self.symbol.is_empty()
    }

    /// Absolute size of the candle body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Midpoint of the candle body.
    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Recommended direction of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// Direction that closes a position of the given sign.
    pub fn closing(position: i64) -> Self {
        match position.signum() {
            1 => Direction::Short,
            -1 => Direction::Long,
            _ => Direction::Neutral,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
            Direction::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Output of one strategy evaluation. Created fresh per bar, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    direction: Direction,
    confidence: f64,
    reason: String,
    is_exit: bool,
}

impl TradeSignal {
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(direction: Direction, confidence: f64, reason: impl Into<String>, is_exit: bool) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            direction,
            confidence,
            reason: reason.into(),
            is_exit,
        }
    }

    pub fn long(confidence: f64, reason: impl Into<String>) -> Self {
        Self::new(Direction::Long, confidence, reason, false)
    }

    pub fn short(confidence: f64, reason: impl Into<String>) -> Self {
        Self::new(Direction::Short, confidence, reason, false)
    }

    pub fn neutral(reason: impl Into<String>) -> Self {
        Self::new(Direction::Neutral, 0.0, reason, false)
    }

    /// Signal that closes exposure of the given sign rather than opening new exposure.
    pub fn exit(position: i64, confidence: f64, reason: impl Into<String>) -> Self {
        Self::new(Direction::closing(position), confidence, reason, true)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_exit(&self) -> bool {
        self.is_exit
    }

    pub fn is_neutral(&self) -> bool {
        self.direction == Direction::Neutral
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2})", self.direction, self.confidence)?;
        if self.is_exit {
            write!(f, " [exit]")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// Snapshot of a company's reported fundamentals. Every metric may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalData {
    pub symbol: String,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub roe: Option<f64>,
    #[serde(default)]
    pub net_margin: Option<f64>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
    #[serde(default)]
    pub current_ratio: Option<f64>,
    #[serde(default)]
    pub revenue_growth: Option<f64>,
    #[serde(default)]
    pub earnings_growth: Option<f64>,
    #[serde(default)]
    pub report_date: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}

impl FundamentalData {
    /// Empty snapshot; fill the metrics that are known.
    pub fn empty(symbol: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            eps: None,
            pe_ratio: None,
            roe: None,
            net_margin: None,
            debt_to_equity: None,
            current_ratio: None,
            revenue_growth: None,
            earnings_growth: None,
            report_date: None,
            fetched_at,
        }
    }

    /// Number of finite, non-null metrics.
    pub fn available_metrics(&self) -> usize {
        [
            self.eps,
            self.pe_ratio,
            self.roe,
            self.net_margin,
            self.debt_to_equity,
            self.current_ratio,
            self.revenue_growth,
            self.earnings_growth,
        ]
        .iter()
        .filter(|m| m.is_some_and(f64::is_finite))
        .count()
    }
}

/// Holding-period label reported by `Strategy::classification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Intraday,
    Swing,
    LongTerm,
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyType::Intraday => write!(f, "intraday"),
            StrategyType::Swing => write!(f, "swing"),
            StrategyType::LongTerm => write!(f, "long_term"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(TradeSignal::long(1.7, "x").confidence(), 1.0);
        assert_eq!(TradeSignal::short(-0.2, "x").confidence(), 0.0);
        assert_eq!(TradeSignal::long(f64::NAN, "x").confidence(), 0.0);
    }

    #[test]
    fn exit_direction_closes_position() {
        let from_long = TradeSignal::exit(10, 0.6, "done");
        assert_eq!(from_long.direction(), Direction::Short);
        assert!(from_long.is_exit());

        let from_short = TradeSignal::exit(-3, 0.6, "done");
        assert_eq!(from_short.direction(), Direction::Long);
    }

    #[test]
    fn bar_validity() {
        let ts = Utc::now();
        assert!(MarketBar::flat("AAPL", ts, 100.0, 10).is_valid());
        assert!(!MarketBar::new("AAPL", ts, 100.0, 99.0, 101.0, 100.0, 10).is_valid());
        assert!(!MarketBar::flat("AAPL", ts, f64::NAN, 10).is_valid());
        assert!(!MarketBar::flat("", ts, 100.0, 10).is_valid());
    }

    #[test]
    fn bar_deserializes_with_default_tags() {
        let raw = r#"{"symbol":"BTCUSDT","timestamp":"2024-01-02T00:00:00Z",
            "open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":42}"#;
        let bar: MarketBar = serde_json::from_str(raw).unwrap();
        assert_eq!(bar.timeframe, Timeframe::Day1);
        assert_eq!(bar.asset_type, AssetType::Equity);
        assert!((bar.typical_price() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn counts_available_metrics() {
        let mut data = FundamentalData::empty("AAPL", Utc::now());
        assert_eq!(data.available_metrics(), 0);
        data.roe = Some(0.2);
        data.pe_ratio = Some(f64::NAN);
        data.eps = Some(5.0);
        assert_eq!(data.available_metrics(), 2);
    }
}
