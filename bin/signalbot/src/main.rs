use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    Config, FundamentalsProvider, InMemoryPortfolio, MarketBar, NoFundamentals, Portfolio,
    StaticFundamentals,
};
use strategy::{StrategyFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(strategies = %cfg.strategy_config_path, bars = %cfg.bars_path, "signalbot starting");

    // ── Collaborators ─────────────────────────────────────────────────────────
    let portfolio: Arc<dyn Portfolio> = match &cfg.positions_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading positions from '{path}'"))?;
            Arc::new(InMemoryPortfolio::from_json(&raw)?)
        }
        None => Arc::new(InMemoryPortfolio::new()),
    };

    let fundamentals: Arc<dyn FundamentalsProvider> = match &cfg.fundamentals_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading fundamentals from '{path}'"))?;
            let provider = StaticFundamentals::from_json(&raw)?;
            info!(symbols = provider.len(), "Fundamentals loaded");
            Arc::new(provider)
        }
        None => {
            info!("No fundamentals file, factor strategies will use proxies");
            Arc::new(NoFundamentals)
        }
    };

    // ── Strategy registry ─────────────────────────────────────────────────────
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading strategies from '{}'", cfg.strategy_config_path))?;
    let registry = StrategyRegistry::from_config(&strategy_file, fundamentals)?;
    if registry.is_empty() {
        warn!("No strategies configured, nothing to do");
        return Ok(());
    }

    // ── Channels ──────────────────────────────────────────────────────────────
    let (bar_tx, bar_rx) = mpsc::channel::<MarketBar>(cfg.channel_capacity);
    let (signal_tx, mut signal_rx) = mpsc::channel(cfg.channel_capacity);
    let registry_handle = tokio::spawn(registry.run(bar_rx, signal_tx, portfolio));

    // ── Signal printer ────────────────────────────────────────────────────────
    let printer = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(signal) = signal_rx.recv().await {
            match serde_json::to_string(&signal) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to encode signal"),
            }
            count += 1;
        }
        count
    });

    // ── Bar replay ────────────────────────────────────────────────────────────
    let file = std::fs::File::open(&cfg.bars_path)
        .with_context(|| format!("opening bars file '{}'", cfg.bars_path))?;
    let mut replayed = 0u64;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let bar: MarketBar = match serde_json::from_str(&line) {
            Ok(bar) => bar,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping malformed bar");
                continue;
            }
        };
        if bar_tx.send(bar).await.is_err() {
            warn!("Strategy registry stopped early");
            break;
        }
        replayed += 1;
    }
    drop(bar_tx);

    registry_handle.await?;
    let signals = printer.await?;
    info!(bars = replayed, signals, "signalbot finished");
    Ok(())
}
