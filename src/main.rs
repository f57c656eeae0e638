use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;

use polyhedge::{
    Config, EnvConfig, HedgeCalculator, MarketQuote, MonteCarloSimulator, StrategyScanner,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("PolyHedge scanner starting...");

    let env_config = EnvConfig::load();
    let config = Config::load(&env_config.config_path)?;

    let raw = fs::read_to_string(&env_config.quotes_path)
        .with_context(|| format!("Failed to read quotes: {}", env_config.quotes_path))?;
    let quotes: Vec<MarketQuote> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse quotes: {}", env_config.quotes_path))?;
    tracing::info!("Loaded {} quotes from {}", quotes.len(), env_config.quotes_path);

    let scanner = StrategyScanner::new(&config);
    let report = scanner.scan(&quotes, Utc::now());

    tracing::info!(
        "Book: ${:.2} across {} positions, expected return {:.1}%",
        report.metrics.total_allocation,
        report.metrics.position_count,
        report.metrics.expected_return_pct
    );
    for diagnostic in report.diagnostics.entries() {
        tracing::info!("Skipped {}: {}", diagnostic.subject, diagnostic.message);
    }

    println!("{}", serde_json::to_string_pretty(&report.strategies)?);

    let Some(best) = report.positions.first() else {
        tracing::info!("No position to validate");
        return Ok(());
    };

    let hedger = HedgeCalculator::new(&config.strategy);
    let Some(hedged) = hedger.hedge_position(scanner.model(), best) else {
        return Ok(());
    };
    let hedged = hedged?;

    let simulator = MonteCarloSimulator::new(&config.simulation, *scanner.model());
    let static_run = simulator.clone().with_rebalancing(None).simulate(&hedged)?;
    let dynamic_run = simulator.with_rebalancing(Some(1)).simulate(&hedged)?;

    tracing::info!(
        "{} {} @ {:.3}: static std ${:.2}, daily std ${:.2}, unhedged std ${:.2}",
        hedged.asset,
        hedged.side,
        hedged.entry_price,
        static_run.stats.std_dev_pnl,
        dynamic_run.stats.std_dev_pnl,
        static_run.stats.unhedged_std_dev_pnl
    );
    println!("{}", serde_json::to_string_pretty(&static_run.stats)?);
    println!("{}", serde_json::to_string_pretty(&dynamic_run.stats)?);

    Ok(())
}
