use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Read-only view of current positions.
///
/// Strategies query it while evaluating a bar and never mutate it.
/// Positive quantities are long, negative are short, zero is flat.
pub trait Portfolio: Send + Sync {
    fn position(&self, symbol: &str) -> i64;

    fn is_flat(&self, symbol: &str) -> bool {
        self.position(symbol) == 0
    }
}

/// Plain map-backed portfolio, used by the replay binary and by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryPortfolio {
    positions: HashMap<String, i64>,
}

impl InMemoryPortfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, symbol: impl Into<String>, quantity: i64) -> Self {
        self.set_position(symbol, quantity);
        self
    }

    pub fn set_position(&mut self, symbol: impl Into<String>, quantity: i64) {
        let symbol = symbol.into();
        if quantity == 0 {
            self.positions.remove(&symbol);
        } else {
            self.positions.insert(symbol, quantity);
        }
    }

    pub fn from_json(raw: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Portfolio for InMemoryPortfolio {
    fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }
}
