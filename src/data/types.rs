use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::barrier::PricingResult;

pub const DAYS_PER_YEAR: f64 = 365.0;

/// Snapshot of a single barrier question as delivered by the market-data
/// collaborator, e.g. "Will BTC reach $130k by Oct 31?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub market_id: String,
    pub asset: String,
    pub current_price: f64,
    pub target_price: f64,
    pub days_to_expiry: f64,
    /// Annualized volatility of the underlying
    pub volatility: f64,
    /// Quoted YES price in (0, 1)
    pub market_price: f64,
    #[serde(default)]
    pub no_price: Option<f64>,
    #[serde(default)]
    pub maturity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuoteError {
    #[error("Asset symbol is empty")]
    EmptyAsset,

    #[error("Field {0} is not finite")]
    NonFinite(&'static str),

    #[error("Spot price must be positive: {0}")]
    NonPositiveSpot(f64),

    #[error("Target price must be positive: {0}")]
    NonPositiveTarget(f64),

    #[error("Volatility must be positive: {0}")]
    NonPositiveVolatility(f64),

    #[error("Days to expiry must not be negative: {0}")]
    NegativeExpiry(f64),

    #[error("Market price must lie in (0, 1): {0}")]
    MarketPriceOutOfRange(f64),
}

impl MarketQuote {
    /// Check the quote is usable for pricing and edge detection
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.asset.trim().is_empty() {
            return Err(QuoteError::EmptyAsset);
        }

        let fields = [
            ("current_price", self.current_price),
            ("target_price", self.target_price),
            ("days_to_expiry", self.days_to_expiry),
            ("volatility", self.volatility),
            ("market_price", self.market_price),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(QuoteError::NonFinite(name));
            }
        }

        if self.current_price <= 0.0 {
            return Err(QuoteError::NonPositiveSpot(self.current_price));
        }
        if self.target_price <= 0.0 {
            return Err(QuoteError::NonPositiveTarget(self.target_price));
        }
        if self.volatility <= 0.0 {
            return Err(QuoteError::NonPositiveVolatility(self.volatility));
        }
        if self.days_to_expiry < 0.0 {
            return Err(QuoteError::NegativeExpiry(self.days_to_expiry));
        }
        if self.market_price <= 0.0 || self.market_price >= 1.0 {
            return Err(QuoteError::MarketPriceOutOfRange(self.market_price));
        }

        Ok(())
    }

    /// Time to expiry in years
    pub fn time_to_expiry(&self) -> f64 {
        self.days_to_expiry / DAYS_PER_YEAR
    }

    /// Quoted NO price, falling back to the complement of the YES price
    pub fn no_price(&self) -> f64 {
        self.no_price.unwrap_or(1.0 - self.market_price)
    }
}

/// A quote together with the model output computed for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedQuote {
    pub quote: MarketQuote,
    pub pricing: PricingResult,
}

#[cfg(test)]
pub(crate) fn sample_quote(target: f64, market_price: f64) -> MarketQuote {
    MarketQuote {
        market_id: format!("btc-{}", target as u64),
        asset: "BTC".to_string(),
        current_price: 107_127.0,
        target_price: target,
        days_to_expiry: 13.5,
        volatility: 0.55,
        market_price,
        no_price: None,
        maturity: None,
    }
}
