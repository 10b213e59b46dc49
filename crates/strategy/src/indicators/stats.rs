//! Descriptive statistics over price and return windows.
//!
//! All dispersion measures are population measures (divide by `n`).

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Covariance of two equally long series. `None` on empty or mismatched input.
pub fn covariance(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let sum: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    Some(sum / xs.len() as f64)
}

/// Period-over-period simple returns. A non-positive previous price yields 0.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Standard score of `value` against `window`. `None` when the window has no dispersion.
pub fn z_score(value: f64, window: &[f64]) -> Option<f64> {
    let m = mean(window)?;
    let sd = std_dev(window)?;
    if sd <= f64::EPSILON * m.abs().max(1.0) {
        return None;
    }
    Some((value - m) / sd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_statistics() {
        assert!(mean(&[]).is_none());
        assert!(std_dev(&[]).is_none());
        assert!(covariance(&[], &[]).is_none());
    }

    #[test]
    fn population_std_dev() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn covariance_of_series_with_itself_is_variance() {
        let xs = [1.0, 3.0, 2.0, 5.0];
        assert!((covariance(&xs, &xs).unwrap() - variance(&xs).unwrap()).abs() < 1e-12);
        assert!(covariance(&xs, &xs[..3]).is_none());
    }

    #[test]
    fn returns_from_prices() {
        let r = simple_returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] + 0.10).abs() < 1e-12);
    }

    #[test]
    fn z_score_of_flat_window_is_none() {
        assert!(z_score(5.0, &[5.0; 10]).is_none());
        let z = z_score(3.0, &[1.0, 3.0]).unwrap();
        assert!((z - 1.0).abs() < 1e-12);
    }
}
