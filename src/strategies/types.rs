use serde::Serialize;
use std::fmt;

use crate::data::types::{MarketQuote, PricedQuote};
use crate::pricing::barrier::PricingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    BetYes,
    BetNo,
    Skip,
    Invalid,
}

impl Recommendation {
    pub fn side(&self) -> Option<Side> {
        match self {
            Recommendation::BetYes => Some(Side::Yes),
            Recommendation::BetNo => Some(Side::No),
            Recommendation::Skip | Recommendation::Invalid => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.side().is_some()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::BetYes => write!(f, "BET_YES"),
            Recommendation::BetNo => write!(f, "BET_NO"),
            Recommendation::Skip => write!(f, "SKIP"),
            Recommendation::Invalid => write!(f, "INVALID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Signed deviation of fair value from the quoted price
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub absolute: f64,
    /// `absolute / market_price * 100`
    pub percentage: f64,
    pub recommendation: Recommendation,
}

/// A priced quote with its edge, produced once per scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub quote: MarketQuote,
    pub pricing: PricingResult,
    pub edge: Edge,
    /// |edge%| reaches the detection threshold
    pub is_opportunity: bool,
}

impl Opportunity {
    pub fn from_priced(priced: &PricedQuote, edge: Edge, is_opportunity: bool) -> Self {
        Self {
            quote: priced.quote.clone(),
            pricing: priced.pricing,
            edge,
            is_opportunity,
        }
    }

    pub fn asset(&self) -> &str {
        &self.quote.asset
    }

    pub fn recommendation(&self) -> Recommendation {
        self.edge.recommendation
    }

    pub fn side(&self) -> Option<Side> {
        self.edge.recommendation.side()
    }

    pub fn theoretical_price(&self) -> f64 {
        self.pricing.theoretical_price
    }

    pub fn market_price(&self) -> f64 {
        self.quote.market_price
    }

    pub fn edge_percentage(&self) -> f64 {
        self.edge.percentage
    }
}
