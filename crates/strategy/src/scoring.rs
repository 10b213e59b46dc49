//! Composite fundamental score used by the factor strategies.
//!
//! Each component is normalized into `[-1, 1]` and the score is the
//! weighted mean of whichever components the snapshot supports.

use common::FundamentalData;

pub const VALUE_WEIGHT: f64 = 0.25;
pub const GROWTH_WEIGHT: f64 = 0.25;
pub const PROFITABILITY_WEIGHT: f64 = 0.25;
pub const LEVERAGE_WEIGHT: f64 = 0.15;
pub const LIQUIDITY_WEIGHT: f64 = 0.10;

/// Fewest usable metrics for a score to count as real data.
pub const MIN_METRICS: usize = 2;

/// Earnings yield that maps to a full +1 value component.
const FULL_YIELD: f64 = 0.10;
/// Growth rate that maps to a full +1 growth component.
const FULL_GROWTH: f64 = 0.25;
/// ROE / net margin that map to a full +1 profitability component.
const FULL_PROFITABILITY: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeScore {
    /// Weighted mean of the available components, in `[-1, 1]`.
    pub score: f64,
    /// Non-null metrics that contributed.
    pub metrics: usize,
}

fn unit(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Earnings yield from EPS over price, falling back to the inverse P/E.
pub fn earnings_yield(data: &FundamentalData, price: f64) -> Option<f64> {
    match (finite(data.eps), finite(data.pe_ratio)) {
        (Some(eps), _) if price > 0.0 => Some(eps / price),
        (_, Some(pe)) if pe != 0.0 => Some(1.0 / pe),
        _ => None,
    }
}

/// Mean of the reported revenue and earnings growth rates.
pub fn growth_rate(data: &FundamentalData) -> Option<f64> {
    let rates: Vec<f64> = [data.revenue_growth, data.earnings_growth]
        .into_iter()
        .filter_map(finite)
        .collect();
    (!rates.is_empty()).then(|| rates.iter().sum::<f64>() / rates.len() as f64)
}

/// Weighted composite over the metrics present in `data`.
///
/// Returns `None` when fewer than `MIN_METRICS` metrics are usable.
pub fn composite(data: &FundamentalData, price: f64) -> Option<CompositeScore> {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    let mut metrics = 0;
    let mut add = |component: f64, w: f64, used: usize| {
        weighted += w * unit(component);
        weight += w;
        metrics += used;
    };

    if let Some(ey) = earnings_yield(data, price) {
        add(ey / FULL_YIELD, VALUE_WEIGHT, 1);
    }

    let growth_metrics = [data.revenue_growth, data.earnings_growth]
        .into_iter()
        .filter_map(finite)
        .count();
    if let Some(g) = growth_rate(data) {
        add(g / FULL_GROWTH, GROWTH_WEIGHT, growth_metrics);
    }

    let profitability: Vec<f64> = [data.roe, data.net_margin]
        .into_iter()
        .filter_map(finite)
        .map(|p| unit(p / FULL_PROFITABILITY))
        .collect();
    if !profitability.is_empty() {
        let mean = profitability.iter().sum::<f64>() / profitability.len() as f64;
        add(mean, PROFITABILITY_WEIGHT, profitability.len());
    }

    if let Some(de) = finite(data.debt_to_equity) {
        add(1.0 - de, LEVERAGE_WEIGHT, 1);
    }
    if let Some(cr) = finite(data.current_ratio) {
        add(cr - 1.0, LIQUIDITY_WEIGHT, 1);
    }

    if metrics < MIN_METRICS || weight <= 0.0 {
        return None;
    }
    Some(CompositeScore {
        score: weighted / weight,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> FundamentalData {
        FundamentalData::empty("JNJ", Utc::now())
    }

    #[test]
    fn single_metric_is_not_enough() {
        let mut data = snapshot();
        data.roe = Some(0.25);
        assert!(composite(&data, 100.0).is_none());
    }

    #[test]
    fn strong_company_scores_positive() {
        let mut data = snapshot();
        data.eps = Some(8.0);
        data.roe = Some(0.30);
        data.debt_to_equity = Some(0.2);
        data.current_ratio = Some(2.5);
        let score = composite(&data, 100.0).unwrap();
        assert_eq!(score.metrics, 4);
        assert!(score.score > 0.5, "got {}", score.score);
    }

    #[test]
    fn weak_company_scores_negative() {
        let mut data = snapshot();
        data.pe_ratio = Some(-12.0);
        data.net_margin = Some(-0.1);
        data.debt_to_equity = Some(3.0);
        let score = composite(&data, 50.0).unwrap();
        assert!(score.score < 0.0);
    }

    #[test]
    fn eps_takes_precedence_over_pe() {
        let mut data = snapshot();
        data.eps = Some(5.0);
        data.pe_ratio = Some(10.0);
        assert!((earnings_yield(&data, 200.0).unwrap() - 0.025).abs() < 1e-12);
        data.eps = None;
        assert!((earnings_yield(&data, 200.0).unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn growth_uses_available_rates() {
        let mut data = snapshot();
        assert!(growth_rate(&data).is_none());
        data.revenue_growth = Some(0.10);
        data.earnings_growth = Some(0.30);
        assert!((growth_rate(&data).unwrap() - 0.20).abs() < 1e-12);
    }
}
