/// Exponential Moving Average of the last `period` values in `data`.
///
/// Seeds with the SMA of the first `period` values of the trailing
/// `period * 3` slice, then smooths forward with `k = 2 / (period + 1)`.
pub fn ema(data: &[f64], period: usize) -> f64 {
    if data.is_empty() || period == 0 {
        return 0.0;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let start = data.len().saturating_sub(period * 3); // enough history
    let slice = &data[start..];

    // Seed with SMA of first `period` values
    let seed_len = period.min(slice.len());
    let mut ema_val: f64 = slice[..seed_len].iter().sum::<f64>() / seed_len as f64;

    for &price in &slice[seed_len..] {
        ema_val = price * k + ema_val * (1.0 - k);
    }
    ema_val
}
