use serde::Serialize;
use tracing::{debug, info};

use crate::config::SizingConfig;
use crate::execution::types::Position;
use crate::strategies::types::{Opportunity, Side};

/// Sizes bets with fractional Kelly.
///
/// Full Kelly: f* = (b·p - q) / b, with b the net odds, p the win
/// probability and q = 1 - p. The stake is f* times the Kelly multiplier,
/// capped at `max_position_size` of capital.
#[derive(Debug, Clone)]
pub struct KellyPositionSizer {
    kelly_multiplier: f64,
    max_position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub total_allocation: f64,
    pub total_expected_value: f64,
    pub expected_return_pct: f64,
    pub position_count: usize,
    /// Inverse Herfindahl index of allocation weights
    pub diversification_ratio: f64,
    pub avg_position_size: f64,
    pub max_position_size: f64,
    pub min_position_size: f64,
}

/// Full-Kelly fraction for a bet paying `odds` net per unit staked.
/// Zero when there is no edge or the inputs are degenerate.
pub fn kelly_fraction(win_probability: f64, odds: f64) -> f64 {
    if win_probability <= 0.0 || win_probability >= 1.0 {
        return 0.0;
    }
    if odds <= 0.0 || !odds.is_finite() {
        return 0.0;
    }

    let lose_probability = 1.0 - win_probability;
    let fraction = (win_probability * odds - lose_probability) / odds;

    fraction.clamp(0.0, 1.0)
}

impl Default for KellyPositionSizer {
    fn default() -> Self {
        Self::new(&SizingConfig::default())
    }
}

impl KellyPositionSizer {
    pub fn new(config: &SizingConfig) -> Self {
        Self {
            kelly_multiplier: config.kelly_multiplier,
            max_position_size: config.max_position_size,
        }
    }

    /// Kelly fraction from a gross payout ratio (1 / price)
    pub fn kelly_for_payout(&self, win_probability: f64, payout_ratio: f64) -> f64 {
        if payout_ratio <= 0.0 {
            return 0.0;
        }
        kelly_fraction(win_probability, payout_ratio - 1.0)
    }

    pub fn size_position(&self, opportunity: &Opportunity, total_capital: f64) -> Position {
        let Some(side) = opportunity.side() else {
            return Position::flat(opportunity.clone());
        };

        // Each winning share pays 1; the stake is the price of the chosen side
        let (win_probability, entry_price) = match side {
            Side::Yes => (opportunity.theoretical_price(), opportunity.market_price()),
            Side::No => (1.0 - opportunity.theoretical_price(), 1.0 - opportunity.market_price()),
        };
        if entry_price <= 0.0 {
            return Position::flat(opportunity.clone());
        }
        let payout_ratio = 1.0 / entry_price;

        let kelly = self.kelly_for_payout(win_probability, payout_ratio);
        let risk_adjusted_fraction = (kelly * self.kelly_multiplier).min(self.max_position_size);

        let allocation = total_capital * risk_adjusted_fraction;
        let shares = allocation / entry_price;
        let expected_value = allocation * (win_probability * payout_ratio - 1.0);

        debug!(
            "Sized {} {}: kelly={:.3}, adjusted={:.3}, allocation=${:.2}",
            opportunity.quote.market_id, side, kelly, risk_adjusted_fraction, allocation
        );

        Position {
            opportunity: opportunity.clone(),
            side: Some(side),
            win_probability,
            payout_ratio,
            kelly_fraction: kelly,
            risk_adjusted_fraction,
            allocation,
            shares,
            expected_value,
        }
    }

    /// Size each opportunity on its own; correlations are not modeled
    pub fn size_portfolio(
        &self,
        opportunities: &[Opportunity],
        total_capital: f64,
    ) -> Vec<Position> {
        opportunities
            .iter()
            .map(|o| self.size_position(o, total_capital))
            .collect()
    }

    /// Drop small positions, order by expected value and de-lever
    /// proportionally if the book exceeds capital
    pub fn optimize_portfolio(
        &self,
        positions: Vec<Position>,
        total_capital: f64,
        min_allocation: f64,
    ) -> Vec<Position> {
        let mut kept: Vec<Position> = positions
            .into_iter()
            .filter(|p| p.allocation >= min_allocation)
            .collect();

        if kept.is_empty() {
            return kept;
        }

        kept.sort_by(|a, b| b.expected_value.total_cmp(&a.expected_value));

        let total_allocated: f64 = kept.iter().map(|p| p.allocation).sum();
        if total_allocated > total_capital {
            let scale = total_capital / total_allocated;
            info!(
                "Portfolio over-allocated (${:.2} > ${:.2}), scaling by {:.4}",
                total_allocated, total_capital, scale
            );
            for position in kept.iter_mut() {
                position.scale(scale);
            }
        }

        kept
    }

    pub fn portfolio_metrics(&self, portfolio: &[Position]) -> PortfolioMetrics {
        let total_allocation: f64 = portfolio.iter().map(|p| p.allocation).sum();
        if portfolio.is_empty() || total_allocation <= 0.0 {
            return PortfolioMetrics {
                total_allocation,
                total_expected_value: portfolio.iter().map(|p| p.expected_value).sum(),
                expected_return_pct: 0.0,
                position_count: portfolio.len(),
                diversification_ratio: 0.0,
                avg_position_size: 0.0,
                max_position_size: 0.0,
                min_position_size: 0.0,
            };
        }

        let total_expected_value: f64 = portfolio.iter().map(|p| p.expected_value).sum();
        let herfindahl: f64 = portfolio
            .iter()
            .map(|p| (p.allocation / total_allocation).powi(2))
            .sum();

        PortfolioMetrics {
            total_allocation,
            total_expected_value,
            expected_return_pct: total_expected_value / total_allocation * 100.0,
            position_count: portfolio.len(),
            diversification_ratio: if herfindahl > 0.0 { 1.0 / herfindahl } else { 0.0 },
            avg_position_size: total_allocation / portfolio.len() as f64,
            max_position_size: portfolio
                .iter()
                .map(|p| p.allocation)
                .fold(f64::NEG_INFINITY, f64::max),
            min_position_size: portfolio
                .iter()
                .map(|p| p.allocation)
                .fold(f64::INFINITY, f64::min),
        }
    }
}
