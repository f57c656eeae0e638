use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::info;

use crate::config::Config;
use crate::data::types::{MarketQuote, PricedQuote};
use crate::execution::sizing::{KellyPositionSizer, PortfolioMetrics};
use crate::execution::types::Position;
use crate::monitoring::diagnostics::Diagnostics;
use crate::pricing::barrier::BarrierPricingModel;
use crate::strategies::constructor::{StrategyConstructor, StrategyDescriptor};
use crate::strategies::detector::{BucketSummary, InefficiencyDetector, RankedOpportunity};
use crate::strategies::grouper::{StrategyGroup, StrategyGrouper};
use crate::strategies::types::Opportunity;

#[derive(Debug, Clone)]
pub struct AssetSummary {
    pub asset: String,
    pub buckets: Vec<BucketSummary>,
}

/// Everything one scan produced, intermediate artifacts included
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub priced: Vec<PricedQuote>,
    /// All valid opportunities, largest |edge%| first
    pub opportunities: Vec<Opportunity>,
    pub summaries: Vec<AssetSummary>,
    pub ranked: Vec<RankedOpportunity>,
    pub positions: Vec<Position>,
    pub metrics: PortfolioMetrics,
    pub strategies: Vec<StrategyDescriptor>,
    pub diagnostics: Diagnostics,
}

/// Runs the full valuation pipeline over one quote snapshot:
/// price, detect, size, group and construct.
pub struct StrategyScanner {
    model: BarrierPricingModel,
    detector: InefficiencyDetector,
    sizer: KellyPositionSizer,
    grouper: StrategyGrouper,
    constructor: StrategyConstructor,
    max_positions: usize,
    total_capital: f64,
    min_allocation: f64,
    net_capital: f64,
    max_strategies_per_asset: usize,
}

impl StrategyScanner {
    pub fn new(config: &Config) -> Self {
        Self {
            model: BarrierPricingModel::new(&config.pricing),
            detector: InefficiencyDetector::new(&config.detection),
            sizer: KellyPositionSizer::new(&config.sizing),
            grouper: StrategyGrouper::new(&config.strategy),
            constructor: StrategyConstructor::new(&config.strategy),
            max_positions: config.detection.max_positions,
            total_capital: config.sizing.total_capital_usd,
            min_allocation: config.sizing.min_allocation_usd,
            net_capital: config.strategy.net_capital_usd,
            max_strategies_per_asset: config.strategy.max_strategies_per_asset,
        }
    }

    pub fn model(&self) -> &BarrierPricingModel {
        &self.model
    }

    pub fn scan(&self, quotes: &[MarketQuote], now: DateTime<Utc>) -> ScanReport {
        let mut diagnostics = Diagnostics::new();

        let priced = self.model.price_batch(quotes, &mut diagnostics);
        let opportunities = self.detector.scan_markets(&priced, &mut diagnostics);
        info!(
            "Priced {} of {} quotes, {} with a valid edge",
            priced.len(),
            quotes.len(),
            opportunities.len()
        );

        // Sized across assets so the whole book respects total capital
        let ranked = self.detector.rank(&opportunities, self.max_positions);
        let candidates: Vec<Opportunity> = ranked.iter().map(|r| r.opportunity.clone()).collect();
        let sized = self.sizer.size_portfolio(&candidates, self.total_capital);
        let positions = self
            .sizer
            .optimize_portfolio(sized, self.total_capital, self.min_allocation);
        let metrics = self.sizer.portfolio_metrics(&positions);

        let mut summaries = Vec::new();
        let mut strategies = Vec::new();
        let mut signatures: HashSet<(String, i64)> = HashSet::new();
        let mut next_id: u64 = 1;

        for asset in assets_in_order(quotes) {
            let asset_opportunities: Vec<Opportunity> = opportunities
                .iter()
                .filter(|o| o.asset() == asset)
                .cloned()
                .collect();
            if asset_opportunities.is_empty() {
                info!("No priced opportunities for {}", asset);
                continue;
            }

            let buckets = self.detector.categorize(&asset_opportunities);
            let buckets = self.detector.summarize(&buckets);
            for bucket in buckets.iter().filter(|b| b.count > 0) {
                info!(
                    "{} {}: {} opportunities, avg edge: {:.1}%",
                    asset, bucket.category, bucket.count, bucket.avg_edge
                );
            }
            summaries.push(AssetSummary {
                asset: asset.to_string(),
                buckets,
            });

            let groups = self.grouper.group_opportunities_at(&asset_opportunities, now);
            let selected = self.select_groups(groups);
            info!("{}: {} strategies after de-duplication", asset, selected.len());

            for group in &selected {
                let descriptor = self
                    .constructor
                    .construct_strategy(group, next_id, self.net_capital, now);
                let (name, maturity_ts) = descriptor.signature();
                if !signatures.insert((name.to_string(), maturity_ts)) {
                    info!("Skipping strategy '{}': already constructed", descriptor.name);
                    continue;
                }
                next_id += 1;
                strategies.push(descriptor);
            }
        }

        ScanReport {
            priced,
            opportunities,
            summaries,
            ranked,
            positions,
            metrics,
            strategies,
            diagnostics,
        }
    }

    /// Best groups first by total edge, one per lead target price, capped
    /// per asset
    fn select_groups(&self, mut groups: Vec<StrategyGroup>) -> Vec<StrategyGroup> {
        groups.sort_by(|a, b| b.total_edge_pct().total_cmp(&a.total_edge_pct()));

        let mut seen_targets: HashSet<u64> = HashSet::new();
        groups
            .into_iter()
            .filter(|g| match g.lead_target() {
                Some(target) => seen_targets.insert(target.to_bits()),
                None => false,
            })
            .take(self.max_strategies_per_asset)
            .collect()
    }
}

fn assets_in_order(quotes: &[MarketQuote]) -> Vec<&str> {
    let mut assets: Vec<&str> = Vec::new();
    for quote in quotes {
        if !assets.contains(&quote.asset.as_str()) {
            assets.push(quote.asset.as_str());
        }
    }
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::sample_quote;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap()
    }

    fn eth_quote(target: f64, market_price: f64) -> MarketQuote {
        MarketQuote {
            market_id: format!("eth-{}", target as u64),
            asset: "ETH".to_string(),
            current_price: 3_900.0,
            target_price: target,
            days_to_expiry: 13.5,
            volatility: 0.65,
            market_price,
            no_price: None,
            maturity: None,
        }
    }

    fn snapshot() -> Vec<MarketQuote> {
        let mut broken = sample_quote(150_000.0, 0.05);
        broken.volatility = 0.0;

        vec![
            sample_quote(130_000.0, 0.07),
            sample_quote(200_000.0, 0.02),
            sample_quote(250_000.0, 0.02),
            broken,
            eth_quote(5_000.0, 0.01),
            eth_quote(6_000.0, 0.03),
        ]
    }

    #[test]
    fn test_scan_skips_invalid_quotes_and_reports() {
        let report = StrategyScanner::new(&Config::default()).scan(&snapshot(), now());

        assert_eq!(report.priced.len(), 5);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics.entries()[0].subject, "btc-150000");
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.summaries[0].asset, "BTC");
    }

    #[test]
    fn test_scan_builds_single_asset_strategies() {
        let config = Config::default();
        let report = StrategyScanner::new(&config).scan(&snapshot(), now());

        assert!(!report.strategies.is_empty());
        for strategy in &report.strategies {
            let asset = strategy.name.split(' ').next().unwrap();
            assert!(!asset.contains('/'));
            assert!(strategy.market_orders.len() <= config.strategy.max_group_size);
        }

        let ids: Vec<u64> = report.strategies.iter().map(|s| s.id).collect();
        let expected: Vec<u64> = (1..=ids.len() as u64).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_scan_book_within_capital() {
        let config = Config::default();
        let report = StrategyScanner::new(&config).scan(&snapshot(), now());

        assert!(report.metrics.total_allocation <= config.sizing.total_capital_usd + 1e-6);
        assert!(report.positions.iter().all(|p| p.side.is_some()));
        assert!(report.ranked.len() <= config.detection.max_positions);
    }

    #[test]
    fn test_caps_strategies_per_asset() {
        let mut config = Config::default();
        config.strategy.max_group_size = 1;
        config.strategy.max_strategies_per_asset = 2;

        let quotes: Vec<MarketQuote> = [180_000.0, 200_000.0, 220_000.0, 250_000.0]
            .iter()
            .map(|&target| sample_quote(target, 0.03))
            .collect();

        let report = StrategyScanner::new(&config).scan(&quotes, now());

        // Four one-leg NO groups collapse to a single name and maturity
        assert_eq!(report.strategies.len(), 1);
        assert_eq!(report.strategies[0].name, "BTC Price Strategy - NO");
    }

    #[test]
    fn test_empty_snapshot() {
        let report = StrategyScanner::new(&Config::default()).scan(&[], now());

        assert!(report.priced.is_empty());
        assert!(report.strategies.is_empty());
        assert_eq!(report.metrics.position_count, 0);
    }
}
