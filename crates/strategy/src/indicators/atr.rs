use super::Candle;

/// True range of one bar given the previous close.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let hl = high - low;
    match prev_close {
        Some(pc) => hl.max((high - pc).abs()).max((low - pc).abs()),
        None => hl,
    }
}

/// Simple average of the last `period` true ranges.
///
/// Needs `period + 1` candles so every range has a previous close.
pub fn average_true_range(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }
    let recent = &candles[candles.len() - (period + 1)..];
    let sum: f64 = recent
        .windows(2)
        .map(|w| true_range(w[1].high, w[1].low, Some(w[0].close)))
        .sum();
    Some(sum / period as f64)
}
