use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::config::StrategyConfig;
use crate::data::types::MarketQuote;
use crate::execution::types::Position;
use crate::pricing::barrier::{BarrierPricingModel, PricingError};
use crate::strategies::types::{Opportunity, Side};

/// Leg notional assumed when no per-leg allocation is supplied
pub const DEFAULT_NOTIONAL_BPS: u32 = 5_000;
const USDC_DECIMALS: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HedgeDirection {
    Long,
    Short,
}

impl HedgeDirection {
    /// A YES bet is long the underlying's upside, so it is offset with a
    /// short; a NO bet with a long
    pub fn offsetting(side: Side) -> Self {
        match side {
            Side::Yes => HedgeDirection::Short,
            Side::No => HedgeDirection::Long,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, HedgeDirection::Long)
    }
}

impl fmt::Display for HedgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeDirection::Long => write!(f, "LONG"),
            HedgeDirection::Short => write!(f, "SHORT"),
        }
    }
}

/// Directional perp order offsetting one prediction-market leg
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeInstruction {
    pub asset: String,
    pub direction: HedgeDirection,
    pub is_long: bool,
    pub notional_usd: f64,
    /// Notional in 6-decimal USDC units
    pub amount: u64,
    pub max_slippage_bps: u32,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HedgePlan {
    pub orders: Vec<HedgeInstruction>,
    pub total_allocation: f64,
}

/// A bet plus the spot hedge that neutralizes its delta at entry.
/// Input to the Monte Carlo simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HedgedPosition {
    pub asset: String,
    pub side: Side,
    pub spot: f64,
    pub barrier: f64,
    pub time_to_expiry: f64,
    pub volatility: f64,
    pub entry_price: f64,
    pub theoretical_price: f64,
    pub cost: f64,
    pub shares: f64,
    /// Delta of one YES claim
    pub delta_per_share: f64,
    /// Signed exposure of the bet to the underlying, in units
    pub position_delta: f64,
    /// Units of underlying held short (negative = long)
    pub hedge_units: f64,
    pub hedge_notional_usd: f64,
    pub edge: f64,
    pub edge_pct: f64,
}

impl HedgedPosition {
    pub fn hedge_direction(&self) -> HedgeDirection {
        HedgeDirection::offsetting(self.side)
    }
}

#[derive(Debug, Clone)]
pub struct HedgeCalculator {
    hedge_ratio: f64,
    max_slippage_bps: u32,
}

impl Default for HedgeCalculator {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl HedgeCalculator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            hedge_ratio: config.hedge_ratio,
            max_slippage_bps: config.hedge_max_slippage_bps,
        }
    }

    /// Hedge order for one leg with the given prediction-market allocation.
    /// `None` for opportunities that are not bet on.
    pub fn calculate_hedge(
        &self,
        opportunity: &Opportunity,
        leg_allocation: f64,
    ) -> Option<HedgeInstruction> {
        let side = opportunity.side()?;
        let direction = HedgeDirection::offsetting(side);
        let notional_usd = leg_allocation * self.hedge_ratio;

        Some(HedgeInstruction {
            asset: opportunity.asset().to_string(),
            direction,
            is_long: direction.is_long(),
            notional_usd,
            amount: to_usdc_units(notional_usd),
            max_slippage_bps: self.max_slippage_bps,
            rationale: format!(
                "{} {} to hedge {} bet (edge: {:.1}%)",
                direction,
                opportunity.asset(),
                opportunity.recommendation(),
                opportunity.edge_percentage()
            ),
        })
    }

    /// Hedge orders for a strategy's legs. `notional_bps[i]` is leg i's
    /// share of `net_capital`; missing entries fall back to 50%.
    pub fn build_hedge_orders(
        &self,
        legs: &[Opportunity],
        notional_bps: &[u32],
        net_capital: f64,
    ) -> HedgePlan {
        let mut plan = HedgePlan::default();

        for (idx, opportunity) in legs.iter().enumerate() {
            let bps = notional_bps.get(idx).copied().unwrap_or(DEFAULT_NOTIONAL_BPS);
            let leg_allocation = net_capital * f64::from(bps) / 10_000.0;

            let Some(order) = self.calculate_hedge(opportunity, leg_allocation) else {
                continue;
            };

            info!(
                "Hedge order: {} {:.2} USDC of {} (hedge for {:.1}% edge)",
                order.direction, order.notional_usd, order.asset, opportunity.edge_percentage()
            );
            plan.total_allocation += order.notional_usd;
            plan.orders.push(order);
        }

        plan
    }

    /// Size the spot hedge that offsets a `bet_amount_usd` bet on `side`
    pub fn delta_hedge(
        &self,
        model: &BarrierPricingModel,
        quote: &MarketQuote,
        side: Side,
        bet_amount_usd: f64,
    ) -> Result<HedgedPosition, PricingError> {
        let pricing = model.price(quote)?;

        let entry_price = match side {
            Side::Yes => quote.market_price,
            Side::No => 1.0 - quote.market_price,
        };
        let shares = bet_amount_usd / entry_price;

        let exposure_sign = match side {
            Side::Yes => 1.0,
            Side::No => -1.0,
        };
        let position_delta = exposure_sign * shares * pricing.delta;
        let hedge_units = position_delta;

        let edge = pricing.theoretical_price - quote.market_price;

        Ok(HedgedPosition {
            asset: quote.asset.clone(),
            side,
            spot: quote.current_price,
            barrier: quote.target_price,
            time_to_expiry: pricing.time_to_expiry,
            volatility: quote.volatility,
            entry_price,
            theoretical_price: pricing.theoretical_price,
            cost: bet_amount_usd,
            shares,
            delta_per_share: pricing.delta,
            position_delta,
            hedge_units,
            hedge_notional_usd: hedge_units.abs() * quote.current_price,
            edge,
            edge_pct: edge / quote.market_price * 100.0,
        })
    }

    /// Delta hedge for a sized position; `None` for flat positions
    pub fn hedge_position(
        &self,
        model: &BarrierPricingModel,
        position: &Position,
    ) -> Option<Result<HedgedPosition, PricingError>> {
        let side = position.side?;
        Some(self.delta_hedge(model, &position.opportunity.quote, side, position.allocation))
    }
}

fn to_usdc_units(amount_usd: f64) -> u64 {
    (amount_usd.max(0.0) * USDC_DECIMALS).round() as u64
}
