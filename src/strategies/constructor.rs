use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::StrategyConfig;
use crate::strategies::grouper::StrategyGroup;
use crate::strategies::hedge::{HedgeCalculator, HedgeInstruction};
use crate::strategies::types::{Opportunity, Recommendation, Side};

const BPS_PER_UNIT: f64 = 10_000.0;
const MAX_EXPECTED_PROFIT_BPS: f64 = 10_000.0;

/// One prediction-market leg of a strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    pub market_id: String,
    pub is_yes: bool,
    /// Share of strategy capital, 10000 = 100%
    pub notional_bps: u32,
    pub max_price_bps: u32,
    /// 1-based execution order
    pub priority: u32,
}

/// Deployable strategy handed to the deployment pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDescriptor {
    pub id: u64,
    pub name: String,
    pub fee_bps: u32,
    /// Unix seconds
    pub maturity_ts: i64,
    pub market_orders: Vec<MarketOrder>,
    pub hedge_orders: Vec<HedgeInstruction>,
    /// Mean signed edge in bps, capped at 100%
    pub expected_profit_bps: i64,
    pub total_notional_bps: u32,
    pub opportunity_count: usize,
    pub avg_edge: f64,
}

impl StrategyDescriptor {
    /// Identity used to suppress re-deploying the same strategy
    pub fn signature(&self) -> (&str, i64) {
        (&self.name, self.maturity_ts)
    }
}

#[derive(Debug, Clone)]
pub struct StrategyConstructor {
    hedge_calculator: HedgeCalculator,
    fee_bps: u32,
    maturity_days: i64,
    max_notional_bps: u32,
    price_cap_buffer: f64,
}

impl Default for StrategyConstructor {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl StrategyConstructor {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            hedge_calculator: HedgeCalculator::new(config),
            fee_bps: config.fee_bps,
            maturity_days: config.maturity_days,
            max_notional_bps: config.max_notional_bps,
            price_cap_buffer: config.price_cap_buffer,
        }
    }

    pub fn construct_strategy(
        &self,
        group: &StrategyGroup,
        strategy_id: u64,
        net_capital: f64,
        now: DateTime<Utc>,
    ) -> StrategyDescriptor {
        let legs = group.opportunities();

        let market_orders: Vec<MarketOrder> = legs
            .iter()
            .enumerate()
            .map(|(idx, opportunity)| self.market_order(opportunity, idx as u32 + 1))
            .collect();
        let total_notional_bps = market_orders.iter().map(|o| o.notional_bps).sum();

        let notional: Vec<u32> = market_orders.iter().map(|o| o.notional_bps).collect();
        let hedge_plan = self.hedge_calculator.build_hedge_orders(legs, &notional, net_capital);

        let avg_edge = if legs.is_empty() {
            0.0
        } else {
            legs.iter().map(|o| o.edge_percentage()).sum::<f64>() / legs.len() as f64
        };
        let expected_profit_bps = (avg_edge * 100.0).min(MAX_EXPECTED_PROFIT_BPS) as i64;

        let maturity_ts = (now + Duration::days(self.maturity_days)).timestamp();

        let descriptor = StrategyDescriptor {
            id: strategy_id,
            name: strategy_name(legs),
            fee_bps: self.fee_bps,
            maturity_ts,
            market_orders,
            hedge_orders: hedge_plan.orders,
            expected_profit_bps,
            total_notional_bps,
            opportunity_count: legs.len(),
            avg_edge,
        };

        info!(
            "Constructed strategy '{}': {} market orders, {} hedge orders, expected profit: {:.1}%",
            descriptor.name,
            descriptor.market_orders.len(),
            descriptor.hedge_orders.len(),
            descriptor.expected_profit_bps as f64 / 100.0
        );

        descriptor
    }

    fn market_order(&self, opportunity: &Opportunity, priority: u32) -> MarketOrder {
        // |edge%| maps one-to-one onto bps of capital, e.g. 12.5% -> 1250
        let edge_bps = (opportunity.edge_percentage().abs() * 100.0) as u32;
        let price_cap = opportunity.market_price() * BPS_PER_UNIT * self.price_cap_buffer;

        MarketOrder {
            market_id: opportunity.quote.market_id.clone(),
            is_yes: opportunity.recommendation() == Recommendation::BetYes,
            notional_bps: edge_bps.min(self.max_notional_bps),
            max_price_bps: price_cap as u32,
            priority,
        }
    }
}

/// "BTC Price Strategy - YES" for one-sided groups, "BTC Price Hedge - Mixed"
/// when both sides are present
fn strategy_name(legs: &[Opportunity]) -> String {
    let mut assets: Vec<&str> = Vec::new();
    for opportunity in legs {
        if !assets.contains(&opportunity.asset()) {
            assets.push(opportunity.asset());
        }
    }
    let asset_label = assets.join("/");

    let mut sides: Vec<Side> = legs.iter().filter_map(|o| o.side()).collect();
    sides.sort();
    sides.dedup();

    match sides.as_slice() {
        [side] => format!("{} Price Strategy - {}", asset_label, side),
        _ => format!("{} Price Hedge - Mixed", asset_label),
    }
}
