pub mod simulator;
pub mod sizing;
pub mod types;
