use serde::Serialize;

use crate::strategies::types::{Opportunity, Side};

/// Capital allocated to one opportunity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub opportunity: Opportunity,
    pub side: Option<Side>,
    pub win_probability: f64,
    /// Gross payout per unit staked (1 / entry price)
    pub payout_ratio: f64,
    /// Full-Kelly fraction, in [0, 1]
    pub kelly_fraction: f64,
    /// Fractional Kelly after the position cap
    pub risk_adjusted_fraction: f64,
    pub allocation: f64,
    pub shares: f64,
    pub expected_value: f64,
}

impl Position {
    /// A zero-sized position for opportunities that are not bet on
    pub fn flat(opportunity: Opportunity) -> Self {
        Self {
            opportunity,
            side: None,
            win_probability: 0.0,
            payout_ratio: 0.0,
            kelly_fraction: 0.0,
            risk_adjusted_fraction: 0.0,
            allocation: 0.0,
            shares: 0.0,
            expected_value: 0.0,
        }
    }

    /// Scale size-dependent fields by `factor`; fractions are left as sized
    pub fn scale(&mut self, factor: f64) {
        self.allocation *= factor;
        self.shares *= factor;
        self.expected_value *= factor;
    }

    /// Price paid per share on the chosen side
    pub fn entry_price(&self) -> Option<f64> {
        match self.side {
            Some(Side::Yes) => Some(self.opportunity.market_price()),
            Some(Side::No) => Some(1.0 - self.opportunity.market_price()),
            None => None,
        }
    }
}
