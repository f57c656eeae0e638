use serde::Serialize;
use statrs::function::erf::erfc;
use std::f64::consts::SQRT_2;
use tracing::debug;

use crate::config::PricingConfig;
use crate::data::types::{MarketQuote, PricedQuote};
use crate::monitoring::diagnostics::Diagnostics;

/// Spot bump (in price units) for the numerical delta
pub const DELTA_BUMP: f64 = 1.0;

const IV_INITIAL_GUESS: f64 = 0.5;
const IV_MAX_ITERATIONS: usize = 100;
const IV_TOLERANCE: f64 = 1e-6;
const IV_VOL_BUMP: f64 = 0.01;
const IV_MIN_SLOPE: f64 = 1e-10;
const IV_MIN_VOL: f64 = 0.01;
const IV_MAX_VOL: f64 = 5.0;
/// Lower bump never evaluates the model at zero volatility
const IV_BUMP_FLOOR: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid input: {name} is not finite")]
    NonFinite { name: &'static str },

    #[error("Invalid input: {name} must be positive, got {value}")]
    NonPositivePrice { name: &'static str, value: f64 },

    #[error("Invalid input: volatility must be positive, got {0}")]
    NonPositiveVolatility(f64),

    #[error("Invalid input: time to expiry must not be negative, got {0}")]
    NegativeTime(f64),

    #[error("Invalid input: market price must lie in (0, 1), got {0}")]
    MarketPriceOutOfRange(f64),

    #[error("Invalid quote: {0}")]
    InvalidQuote(#[from] crate::data::types::QuoteError),
}

/// Model output for one quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingResult {
    /// Probability the barrier is touched before expiry, in [0, 1]
    pub theoretical_price: f64,
    /// Sensitivity of the probability to a unit move in spot
    pub delta: f64,
    pub time_to_expiry: f64,
}

/// Outcome of the implied-volatility search.
///
/// The solver never fails on non-convergence; `converged` and `residual`
/// tell the caller how good the estimate is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolSolve {
    pub volatility: f64,
    pub iterations: usize,
    /// `hit_probability(volatility) - market_price`
    pub residual: f64,
    pub converged: bool,
}

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Prices "touch H before T" claims on a GBM underlying.
///
/// A YES share on "BTC > $130k by Oct 31" pays 1 if the running maximum of
/// spot reaches the barrier before expiry and 0 otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierPricingModel {
    pub risk_free_rate: f64,
    pub drift: f64,
}

impl Default for BarrierPricingModel {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            drift: 0.0,
        }
    }
}

impl BarrierPricingModel {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            risk_free_rate: config.risk_free_rate,
            drift: config.drift,
        }
    }

    /// Probability that spot reaches `barrier` within `time_to_expiry` years.
    ///
    /// Already-breached barriers return 1. At zero time remaining the claim
    /// resolves on the current spot: 1 if at or above the barrier, else 0.
    pub fn hit_probability(
        &self,
        spot: f64,
        barrier: f64,
        time_to_expiry: f64,
        volatility: f64,
    ) -> Result<f64, PricingError> {
        check_finite("spot", spot)?;
        check_finite("barrier", barrier)?;
        check_finite("time_to_expiry", time_to_expiry)?;
        check_finite("volatility", volatility)?;
        if spot <= 0.0 {
            return Err(PricingError::NonPositivePrice { name: "spot", value: spot });
        }
        if barrier <= 0.0 {
            return Err(PricingError::NonPositivePrice { name: "barrier", value: barrier });
        }
        if volatility <= 0.0 {
            return Err(PricingError::NonPositiveVolatility(volatility));
        }
        if time_to_expiry < 0.0 {
            return Err(PricingError::NegativeTime(time_to_expiry));
        }

        if spot >= barrier {
            return Ok(1.0);
        }
        if time_to_expiry == 0.0 {
            return Ok(0.0);
        }

        let b = (barrier / spot).ln();
        let nu = (self.drift - self.risk_free_rate) / volatility - volatility / 2.0;
        let sqrt_t = time_to_expiry.sqrt();
        let scaled_distance = -b / (volatility * sqrt_t);

        let direct = norm_cdf(scaled_distance + nu * sqrt_t);

        // Reflected term in log space so a huge exponent times a vanishing
        // tail does not produce inf * 0
        let reflected_tail = norm_cdf(scaled_distance - nu * sqrt_t);
        let reflected = if reflected_tail > 0.0 {
            let exponent = -2.0 * nu * b / volatility.powi(2);
            (exponent + reflected_tail.ln()).exp()
        } else {
            0.0
        };

        let probability = direct + reflected;
        if probability.is_nan() {
            return Ok(0.0);
        }
        Ok(probability.clamp(0.0, 1.0))
    }

    /// Central-difference delta with the default one-unit spot bump
    pub fn delta(
        &self,
        spot: f64,
        barrier: f64,
        time_to_expiry: f64,
        volatility: f64,
    ) -> Result<f64, PricingError> {
        self.delta_with_bump(spot, barrier, time_to_expiry, volatility, DELTA_BUMP)
    }

    pub fn delta_with_bump(
        &self,
        spot: f64,
        barrier: f64,
        time_to_expiry: f64,
        volatility: f64,
        bump: f64,
    ) -> Result<f64, PricingError> {
        // Sub-unit spots would otherwise be bumped to a non-positive price
        let bump = bump.min(spot * 0.5);
        let up = self.hit_probability(spot + bump, barrier, time_to_expiry, volatility)?;
        let down = self.hit_probability(spot - bump, barrier, time_to_expiry, volatility)?;
        Ok((up - down) / (2.0 * bump))
    }

    /// Volatility at which the model reproduces `market_price`, starting
    /// the search at 50%
    pub fn implied_volatility(
        &self,
        spot: f64,
        barrier: f64,
        time_to_expiry: f64,
        market_price: f64,
    ) -> Result<VolSolve, PricingError> {
        self.implied_volatility_from(spot, barrier, time_to_expiry, market_price, IV_INITIAL_GUESS)
    }

    /// Newton-Raphson on volatility with a finite-difference slope. Each
    /// iterate is damped to at least half the previous one and clamped to
    /// [0.01, 5.0].
    pub fn implied_volatility_from(
        &self,
        spot: f64,
        barrier: f64,
        time_to_expiry: f64,
        market_price: f64,
        initial_guess: f64,
    ) -> Result<VolSolve, PricingError> {
        check_finite("market_price", market_price)?;
        check_finite("initial_guess", initial_guess)?;
        if market_price <= 0.0 || market_price >= 1.0 {
            return Err(PricingError::MarketPriceOutOfRange(market_price));
        }

        let mut sigma = initial_guess.clamp(IV_MIN_VOL, IV_MAX_VOL);
        let mut iterations = 0;

        while iterations < IV_MAX_ITERATIONS {
            let error = self.hit_probability(spot, barrier, time_to_expiry, sigma)? - market_price;
            if error.abs() < IV_TOLERANCE {
                return Ok(VolSolve {
                    volatility: sigma,
                    iterations,
                    residual: error,
                    converged: true,
                });
            }

            let up = sigma + IV_VOL_BUMP;
            let down = (sigma - IV_VOL_BUMP).max(IV_BUMP_FLOOR);
            let slope = (self.hit_probability(spot, barrier, time_to_expiry, up)?
                - self.hit_probability(spot, barrier, time_to_expiry, down)?)
                / (up - down);

            if slope.abs() < IV_MIN_SLOPE {
                debug!("Implied vol slope vanished at sigma={:.4}, stopping", sigma);
                break;
            }

            // At most halve sigma per step; an undamped step overshoots into
            // the flat region near the floor where the slope vanishes
            sigma = (sigma - error / slope)
                .max(sigma / 2.0)
                .clamp(IV_MIN_VOL, IV_MAX_VOL);
            iterations += 1;
        }

        let residual = self.hit_probability(spot, barrier, time_to_expiry, sigma)? - market_price;
        Ok(VolSolve {
            volatility: sigma,
            iterations,
            residual,
            converged: residual.abs() < IV_TOLERANCE,
        })
    }

    /// Theoretical price and delta for a validated quote
    pub fn price(&self, quote: &MarketQuote) -> Result<PricingResult, PricingError> {
        quote.validate()?;

        let time_to_expiry = quote.time_to_expiry();
        let theoretical_price = self.hit_probability(
            quote.current_price,
            quote.target_price,
            time_to_expiry,
            quote.volatility,
        )?;
        let delta = self.delta(
            quote.current_price,
            quote.target_price,
            time_to_expiry,
            quote.volatility,
        )?;

        Ok(PricingResult {
            theoretical_price,
            delta,
            time_to_expiry,
        })
    }

    /// Price every quote, skipping (and reporting) the ones that fail
    pub fn price_batch(
        &self,
        quotes: &[MarketQuote],
        diagnostics: &mut Diagnostics,
    ) -> Vec<PricedQuote> {
        let mut priced = Vec::with_capacity(quotes.len());

        for quote in quotes {
            match self.price(quote) {
                Ok(pricing) => {
                    debug!(
                        "Priced {} {} > {:.0}: p={:.4}, delta={:.3e}",
                        quote.market_id, quote.asset, quote.target_price,
                        pricing.theoretical_price, pricing.delta
                    );
                    priced.push(PricedQuote {
                        quote: quote.clone(),
                        pricing,
                    });
                }
                Err(e) => diagnostics.warn(&quote.market_id, format!("pricing skipped: {}", e)),
            }
        }

        priced
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), PricingError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PricingError::NonFinite { name })
    }
}
