use std::collections::HashMap;

use crate::{FundamentalData, Result};

/// Source of fundamental snapshots for the factor strategies.
///
/// Implementations must answer from memory. A slow or remote provider has to
/// be fronted by a cache such as `StaticFundamentals` before it is handed to
/// a strategy, because `lookup` runs inside bar evaluation.
pub trait FundamentalsProvider: Send + Sync {
    fn lookup(&self, symbol: &str) -> Option<FundamentalData>;
}

/// Provider that never has data. Factor strategies fall back to their proxies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFundamentals;

impl FundamentalsProvider for NoFundamentals {
    fn lookup(&self, _symbol: &str) -> Option<FundamentalData> {
        None
    }
}

/// Fixed in-memory snapshot keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticFundamentals {
    by_symbol: HashMap<String, FundamentalData>,
}

impl StaticFundamentals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot for `data.symbol`.
    pub fn insert(&mut self, data: FundamentalData) {
        self.by_symbol.insert(data.symbol.clone(), data);
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Parse a JSON array of snapshots. Later entries for a symbol win.
    pub fn from_json(raw: &str) -> Result<Self> {
        let snapshots: Vec<FundamentalData> = serde_json::from_str(raw)?;
        Ok(snapshots.into_iter().collect())
    }
}

impl FromIterator<FundamentalData> for StaticFundamentals {
    fn from_iter<I: IntoIterator<Item = FundamentalData>>(iter: I) -> Self {
        let mut provider = Self::new();
        for data in iter {
            provider.insert(data);
        }
        provider
    }
}

impl FundamentalsProvider for StaticFundamentals {
    fn lookup(&self, symbol: &str) -> Option<FundamentalData> {
        self.by_symbol.get(symbol).cloned()
    }
}
