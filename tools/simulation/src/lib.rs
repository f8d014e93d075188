//! Exchange simulation and invariant testing
//!
//! Drives the full exchange with seeded trading bots on parallel threads
//! and audits the result.
//!
//! # Modules
//! - `bots`: Market maker and retail trader bots
//! - `config`: TOML run configuration
//! - `runner`: User seeding and the threaded bot loop
//! - `audit`: Post-run invariant checks
//! - `metrics`: Counters and latency histograms
//! - `export`: JSON report

pub mod audit;
pub mod bots;
pub mod config;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::SimConfig;
pub use export::SimulationReport;
pub use runner::Simulation;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
