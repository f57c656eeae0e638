use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::Normal;
use statrs::statistics::Statistics;
use tracing::info;

use crate::config::SimulationConfig;
use crate::data::types::DAYS_PER_YEAR;
use crate::pricing::barrier::{BarrierPricingModel, PricingError};
use crate::strategies::hedge::HedgedPosition;
use crate::strategies::types::Side;

/// Spreads path indices across the seed space
const PATH_SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("Number of paths must be positive")]
    NoPaths,

    #[error("Steps per year must be positive")]
    NoSteps,

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Terminal state of one simulated path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathOutcome {
    pub hit: bool,
    pub final_price: f64,
    pub max_price: f64,
    pub bet_pnl: f64,
    pub hedge_pnl: f64,
    pub fees: f64,
    pub total_pnl: f64,
    pub rebalances: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStats {
    pub mean_pnl: f64,
    pub std_dev_pnl: f64,
    /// Standard error of `mean_pnl`
    pub std_error: f64,
    pub hit_rate: f64,
    /// Share of paths with positive total PnL
    pub win_fraction: f64,
    pub avg_rebalances: f64,
    pub avg_fees: f64,
    /// Same paths with the bet alone (entry fee included)
    pub unhedged_mean_pnl: f64,
    pub unhedged_std_dev_pnl: f64,
    /// Drop in PnL standard deviation from hedging, in percent
    pub risk_reduction_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub num_paths: usize,
    pub rebalance_every_days: Option<u32>,
    pub paths: Vec<PathOutcome>,
    pub stats: SimulationStats,
}

/// Replays a hedged bet over GBM paths at zero drift.
///
/// Each path draws from its own generator seeded from the run seed and
/// the path index, so results do not depend on how rayon schedules paths.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    model: BarrierPricingModel,
    num_paths: usize,
    fee_rate: f64,
    rebalance_every_days: Option<u32>,
    seed: u64,
    steps_per_year: u32,
}

impl MonteCarloSimulator {
    pub fn new(config: &SimulationConfig, model: BarrierPricingModel) -> Self {
        Self {
            model,
            num_paths: config.num_paths,
            fee_rate: config.fee_rate,
            rebalance_every_days: config.rebalance_every_days,
            seed: config.seed,
            steps_per_year: config.steps_per_year,
        }
    }

    pub fn with_paths(mut self, num_paths: usize) -> Self {
        self.num_paths = num_paths;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// `None` keeps the entry hedge for the whole path
    pub fn with_rebalancing(mut self, every_days: Option<u32>) -> Self {
        self.rebalance_every_days = every_days;
        self
    }

    pub fn simulate(&self, position: &HedgedPosition) -> Result<SimulationResult, SimulationError> {
        self.check(position)?;

        let dt = 1.0 / f64::from(self.steps_per_year);
        let n_steps = (position.time_to_expiry * f64::from(self.steps_per_year)).floor() as usize;
        let rebalance_steps = self.rebalance_every_days.map(|days| {
            (f64::from(days) * f64::from(self.steps_per_year) / DAYS_PER_YEAR)
                .round()
                .max(1.0) as usize
        });

        let paths: Vec<PathOutcome> = (0..self.num_paths)
            .into_par_iter()
            .map(|path| self.simulate_path(position, path as u64, n_steps, dt, rebalance_steps))
            .collect::<Result<Vec<_>, _>>()?;

        let stats = self.aggregate(position, &paths);
        info!(
            "Simulated {} paths ({}): mean PnL ${:.2} +/- {:.2}, hit rate {:.1}%, risk reduction {:.1}%",
            paths.len(),
            match self.rebalance_every_days {
                Some(days) => format!("rebalance every {}d", days),
                None => "static hedge".to_string(),
            },
            stats.mean_pnl,
            stats.std_error,
            stats.hit_rate * 100.0,
            stats.risk_reduction_pct
        );

        Ok(SimulationResult {
            num_paths: self.num_paths,
            rebalance_every_days: self.rebalance_every_days,
            paths,
            stats,
        })
    }

    fn check(&self, position: &HedgedPosition) -> Result<(), SimulationError> {
        if self.num_paths == 0 {
            return Err(SimulationError::NoPaths);
        }
        if self.steps_per_year == 0 {
            return Err(SimulationError::NoSteps);
        }

        let fields = [
            ("spot", position.spot),
            ("barrier", position.barrier),
            ("volatility", position.volatility),
            ("time_to_expiry", position.time_to_expiry),
            ("cost", position.cost),
            ("shares", position.shares),
            ("hedge_units", position.hedge_units),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimulationError::InvalidPosition(format!("{} is not finite", name)));
        }
        if position.spot <= 0.0 || position.barrier <= 0.0 {
            return Err(SimulationError::InvalidPosition("prices must be positive".to_string()));
        }
        if position.volatility <= 0.0 {
            return Err(PricingError::NonPositiveVolatility(position.volatility).into());
        }
        if position.time_to_expiry < 0.0 {
            return Err(PricingError::NegativeTime(position.time_to_expiry).into());
        }

        Ok(())
    }

    fn simulate_path(
        &self,
        position: &HedgedPosition,
        path: u64,
        n_steps: usize,
        dt: f64,
        rebalance_steps: Option<usize>,
    ) -> Result<PathOutcome, SimulationError> {
        let path_seed = self.seed.wrapping_add(path.wrapping_mul(PATH_SEED_STRIDE));
        let mut rng = StdRng::seed_from_u64(path_seed);
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SimulationError::InvalidPosition(e.to_string()))?;

        let sigma = position.volatility;
        let drift = -0.5 * sigma * sigma * dt;
        let diffusion = sigma * dt.sqrt();
        let exposure_sign = match position.side {
            Side::Yes => 1.0,
            Side::No => -1.0,
        };

        let mut price = position.spot;
        let mut max_price = position.spot;
        // Units short; negative means long
        let mut hedge = position.hedge_units;
        let mut hedge_pnl = 0.0;
        let mut fees = self.fee_rate * position.cost + self.fee_rate * hedge.abs() * position.spot;
        let mut rebalances = 0u32;

        for step in 1..=n_steps {
            let z: f64 = normal.sample(&mut rng);
            let next = price * (drift + diffusion * z).exp();
            hedge_pnl -= hedge * (next - price);
            price = next;
            max_price = max_price.max(price);

            let Some(every) = rebalance_steps else {
                continue;
            };
            if step % every != 0 {
                continue;
            }
            let remaining = position.time_to_expiry - step as f64 * dt;
            if remaining <= 0.0 {
                continue;
            }

            let delta = self.model.delta(price, position.barrier, remaining, sigma)?;
            let target = exposure_sign * delta * position.shares;
            fees += self.fee_rate * (target - hedge).abs() * price;
            hedge = target;
            rebalances += 1;
        }

        let hit = max_price >= position.barrier;
        let wins = match position.side {
            Side::Yes => hit,
            Side::No => !hit,
        };
        let bet_pnl = if wins {
            position.shares - position.cost
        } else {
            -position.cost
        };

        Ok(PathOutcome {
            hit,
            final_price: price,
            max_price,
            bet_pnl,
            hedge_pnl,
            fees,
            total_pnl: bet_pnl + hedge_pnl - fees,
            rebalances,
        })
    }

    fn aggregate(&self, position: &HedgedPosition, paths: &[PathOutcome]) -> SimulationStats {
        let n = paths.len() as f64;
        let total: Vec<f64> = paths.iter().map(|p| p.total_pnl).collect();
        let unhedged: Vec<f64> = paths
            .iter()
            .map(|p| p.bet_pnl - self.fee_rate * position.cost)
            .collect();

        let std_dev_pnl = sample_std_dev(&total);
        let unhedged_std_dev_pnl = sample_std_dev(&unhedged);
        let risk_reduction_pct = if unhedged_std_dev_pnl > 0.0 {
            (1.0 - std_dev_pnl / unhedged_std_dev_pnl) * 100.0
        } else {
            0.0
        };

        SimulationStats {
            mean_pnl: total.iter().mean(),
            std_dev_pnl,
            std_error: std_dev_pnl / n.sqrt(),
            hit_rate: paths.iter().filter(|p| p.hit).count() as f64 / n,
            win_fraction: paths.iter().filter(|p| p.total_pnl > 0.0).count() as f64 / n,
            avg_rebalances: paths.iter().map(|p| f64::from(p.rebalances)).mean(),
            avg_fees: paths.iter().map(|p| p.fees).mean(),
            unhedged_mean_pnl: unhedged.iter().mean(),
            unhedged_std_dev_pnl,
            risk_reduction_pct,
        }
    }
}

/// Sample standard deviation; zero for fewer than two observations
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::sample_quote;
    use crate::strategies::hedge::HedgeCalculator;

    fn btc_130k_yes() -> HedgedPosition {
        HedgeCalculator::default()
            .delta_hedge(
                &BarrierPricingModel::default(),
                &sample_quote(130_000.0, 0.07),
                Side::Yes,
                100.0,
            )
            .unwrap()
    }

    fn simulator(paths: usize) -> MonteCarloSimulator {
        MonteCarloSimulator::new(&SimulationConfig::default(), BarrierPricingModel::default())
            .with_paths(paths)
    }

    #[test]
    fn test_same_seed_same_statistics() {
        let position = btc_130k_yes();

        let first = simulator(2_000).simulate(&position).unwrap();
        let second = simulator(2_000).simulate(&position).unwrap();

        assert_eq!(first.stats, second.stats);
        assert_eq!(first.paths, second.paths);
    }

    #[test]
    fn test_different_seed_differs() {
        let position = btc_130k_yes();

        let first = simulator(2_000).simulate(&position).unwrap();
        let second = simulator(2_000).with_seed(7).simulate(&position).unwrap();

        assert_ne!(first.stats.mean_pnl, second.stats.mean_pnl);
    }

    #[test]
    fn test_standard_error_shrinks_with_paths() {
        let position = btc_130k_yes();

        let small = simulator(400).simulate(&position).unwrap();
        let large = simulator(6_400).simulate(&position).unwrap();

        // 16x the paths should cut the standard error by about 4x
        let ratio = small.stats.std_error / large.stats.std_error;
        assert!(ratio > 2.5 && ratio < 6.0, "ratio = {}", ratio);
    }

    #[test]
    fn test_running_max_bounds_path() {
        let position = btc_130k_yes();
        let result = simulator(500).simulate(&position).unwrap();

        for path in &result.paths {
            assert!(path.max_price >= position.spot);
            assert!(path.max_price >= path.final_price);
            assert_eq!(path.hit, path.max_price >= position.barrier);
        }
    }

    #[test]
    fn test_static_vs_dynamic_rebalancing() {
        let position = btc_130k_yes();

        let static_run = simulator(500).simulate(&position).unwrap();
        let dynamic = simulator(500)
            .with_rebalancing(Some(1))
            .simulate(&position)
            .unwrap();

        assert_eq!(static_run.stats.avg_rebalances, 0.0);
        // 13 daily steps in 13.5 days, each with time remaining
        assert!((dynamic.stats.avg_rebalances - 13.0).abs() < 1e-12);
        assert!(dynamic.stats.avg_fees > static_run.stats.avg_fees);
    }

    #[test]
    fn test_settlement_and_fees() {
        let position = btc_130k_yes();
        let result = simulator(1_000).simulate(&position).unwrap();
        let entry_fee = 0.001 * position.cost + 0.001 * position.hedge_units.abs() * position.spot;

        for path in &result.paths {
            let expected_bet = if path.hit {
                position.shares - position.cost
            } else {
                -position.cost
            };
            assert!((path.bet_pnl - expected_bet).abs() < 1e-9);
            assert!((path.fees - entry_fee).abs() < 1e-9);
            // Static hedge marks to the terminal move
            let expected_hedge = -position.hedge_units * (path.final_price - position.spot);
            assert!((path.hedge_pnl - expected_hedge).abs() < 1e-6);
        }
        assert!(result.stats.hit_rate > 0.0 && result.stats.hit_rate < 0.5);
    }

    #[test]
    fn test_no_bet_wins_without_touch() {
        let position = HedgeCalculator::default()
            .delta_hedge(
                &BarrierPricingModel::default(),
                &sample_quote(200_000.0, 0.02),
                Side::No,
                100.0,
            )
            .unwrap();

        let result = simulator(500).simulate(&position).unwrap();

        for path in result.paths.iter().filter(|p| !p.hit) {
            assert!((path.bet_pnl - (position.shares - position.cost)).abs() < 1e-9);
        }
        assert!(result.stats.win_fraction > 0.9);
    }

    #[test]
    fn test_rejects_empty_run_and_bad_position() {
        let position = btc_130k_yes();
        assert_eq!(simulator(0).simulate(&position).unwrap_err(), SimulationError::NoPaths);

        let mut flat_vol = position.clone();
        flat_vol.volatility = 0.0;
        assert!(matches!(
            simulator(10).simulate(&flat_vol),
            Err(SimulationError::Pricing(PricingError::NonPositiveVolatility(_)))
        ));
    }
}
