use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub risk_free_rate: f64,
    /// Annualized drift of the underlying; zero for risk-neutral pricing
    #[serde(default)]
    pub drift: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Fraction of full Kelly actually staked
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    /// Cap on the risk-adjusted fraction of capital per position
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_min_allocation")]
    pub min_allocation_usd: f64,
    #[serde(default = "default_total_capital")]
    pub total_capital_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Minimum relative edge (0.10 = 10%) before a quote is actionable
    #[serde(default = "default_min_edge")]
    pub min_edge_threshold: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Hedge notional as a fraction of each leg's allocation
    #[serde(default = "default_hedge_ratio")]
    pub hedge_ratio: f64,
    #[serde(default = "default_hedge_slippage")]
    pub hedge_max_slippage_bps: u32,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default = "default_maturity_days")]
    pub maturity_days: i64,
    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
    #[serde(default = "default_maturity_tolerance")]
    pub maturity_tolerance_days: i64,
    #[serde(default = "default_max_notional_bps")]
    pub max_notional_bps: u32,
    /// Multiplier on the quoted price used as the order's price cap
    #[serde(default = "default_price_cap_buffer")]
    pub price_cap_buffer: f64,
    #[serde(default = "default_max_strategies_per_asset")]
    pub max_strategies_per_asset: usize,
    #[serde(default = "default_net_capital")]
    pub net_capital_usd: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_num_paths")]
    pub num_paths: usize,
    /// Proportional transaction cost (0.001 = 0.1%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
    /// Days between hedge rebalances; `None` keeps the entry hedge static
    #[serde(default)]
    pub rebalance_every_days: Option<u32>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_steps_per_year")]
    pub steps_per_year: u32,
}

fn default_kelly_multiplier() -> f64 { 0.25 }
fn default_max_position_size() -> f64 { 0.40 }
fn default_min_allocation() -> f64 { 100.0 }
fn default_total_capital() -> f64 { 10_000.0 }
fn default_min_edge() -> f64 { 0.10 }
fn default_max_positions() -> usize { 10 }
fn default_hedge_ratio() -> f64 { 0.3 }
fn default_hedge_slippage() -> u32 { 500 }
fn default_fee_bps() -> u32 { 200 }
fn default_maturity_days() -> i64 { 30 }
fn default_min_group_size() -> usize { 1 }
fn default_max_group_size() -> usize { 4 }
fn default_maturity_tolerance() -> i64 { 1 }
fn default_max_notional_bps() -> u32 { 5_000 }
fn default_price_cap_buffer() -> f64 { 1.25 }
fn default_max_strategies_per_asset() -> usize { 3 }
fn default_net_capital() -> f64 { 1_000.0 }
fn default_num_paths() -> usize { 10_000 }
fn default_fee_rate() -> f64 { 0.001 }
fn default_seed() -> u64 { 42 }
fn default_steps_per_year() -> u32 { 365 }

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            drift: 0.0,
        }
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: default_kelly_multiplier(),
            max_position_size: default_max_position_size(),
            min_allocation_usd: default_min_allocation(),
            total_capital_usd: default_total_capital(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_edge_threshold: default_min_edge(),
            max_positions: default_max_positions(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            hedge_ratio: default_hedge_ratio(),
            hedge_max_slippage_bps: default_hedge_slippage(),
            fee_bps: default_fee_bps(),
            maturity_days: default_maturity_days(),
            min_group_size: default_min_group_size(),
            max_group_size: default_max_group_size(),
            maturity_tolerance_days: default_maturity_tolerance(),
            max_notional_bps: default_max_notional_bps(),
            price_cap_buffer: default_price_cap_buffer(),
            max_strategies_per_asset: default_max_strategies_per_asset(),
            net_capital_usd: default_net_capital(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_paths: default_num_paths(),
            fee_rate: default_fee_rate(),
            rebalance_every_days: None,
            seed: default_seed(),
            steps_per_year: default_steps_per_year(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub quotes_path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            config_path: std::env::var("POLYHEDGE_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            quotes_path: std::env::var("POLYHEDGE_QUOTES")
                .unwrap_or_else(|_| "fixtures/quotes.json".to_string()),
        }
    }
}
