use super::Candle;

/// Volume-weighted typical price. `None` if the candles carry no volume.
pub fn vwap(candles: &[Candle]) -> Option<f64> {
    let volume: f64 = candles.iter().map(|c| c.volume).sum();
    if volume <= 0.0 {
        return None;
    }
    let notional: f64 = candles.iter().map(|c| c.typical_price() * c.volume).sum();
    Some(notional / volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vwap_weights_by_volume() {
        let a = Candle { open: 10.0, high: 10.0, low: 10.0, close: 10.0, volume: 1.0 };
        let b = Candle { open: 20.0, high: 20.0, low: 20.0, close: 20.0, volume: 3.0 };
        assert!((vwap(&[a, b]).unwrap() - 17.5).abs() < 1e-12);
    }

    #[test]
    fn vwap_without_volume_is_none() {
        let a = Candle { open: 10.0, high: 10.0, low: 10.0, close: 10.0, volume: 0.0 };
        assert!(vwap(&[a]).is_none());
    }
}
