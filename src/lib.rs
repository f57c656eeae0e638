//! Barrier-hit pricing, Kelly sizing, edge detection and hedged strategy
//! construction for prediction-market price questions.

pub mod config;
pub mod data;
pub mod execution;
pub mod monitoring;
pub mod pricing;
pub mod strategies;

pub use config::{Config, EnvConfig};
pub use data::types::{MarketQuote, PricedQuote, QuoteError};
pub use execution::simulator::{MonteCarloSimulator, SimulationError, SimulationResult};
pub use execution::sizing::{kelly_fraction, KellyPositionSizer, PortfolioMetrics};
pub use execution::types::Position;
pub use monitoring::diagnostics::{Diagnostic, Diagnostics};
pub use pricing::barrier::{BarrierPricingModel, PricingError, PricingResult, VolSolve};
pub use strategies::constructor::{MarketOrder, StrategyConstructor, StrategyDescriptor};
pub use strategies::detector::InefficiencyDetector;
pub use strategies::grouper::{StrategyGroup, StrategyGrouper};
pub use strategies::hedge::{HedgeCalculator, HedgeDirection, HedgeInstruction, HedgedPosition};
pub use strategies::scanner::{ScanReport, StrategyScanner};
pub use strategies::types::{Edge, Opportunity, Recommendation, Side};
