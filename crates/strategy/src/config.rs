use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::Result;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "bollinger"
/// name = "ES Bollinger 20"
/// symbols = ["ES"]
///
/// [strategy.params]
/// window = 20
/// multiplier = 2.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Strategy type identifier, e.g. "momentum", "pairs", "twap".
    #[serde(rename = "type")]
    pub strategy_type: String,
    /// Human-readable name shown in logs and signal output.
    pub name: String,
    /// Symbols routed to this strategy. Empty means every symbol.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Strategy-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strategy_tables() {
        let cfg = StrategyFileConfig::parse(
            r#"
            [[strategy]]
            type = "pairs"
            name = "KO/PEP"
            symbols = ["KO", "PEP"]

            [strategy.params]
            symbol_a = "KO"
            symbol_b = "PEP"
            window = 30

            [[strategy]]
            type = "candlestick"
            name = "Patterns"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.strategies.len(), 2);
        assert_eq!(cfg.strategies[0].symbols, vec!["KO", "PEP"]);
        assert_eq!(cfg.strategies[0].params["window"].as_integer(), Some(30));
        assert!(cfg.strategies[1].symbols.is_empty());
        assert!(cfg.strategies[1].params.is_empty());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(StrategyFileConfig::parse("[[strategy]]\ntype = ").is_err());
    }
}
