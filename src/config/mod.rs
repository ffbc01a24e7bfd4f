//! Runtime configuration
//!
//! ## Loading Order
//!
//! 1. `INSIGHTS_CONFIG` environment variable (path to TOML file)
//! 2. `insights.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`InsightsConfig`] is passed to whatever needs it; there is no
//! global instance.

mod insights_config;
pub mod validation;

pub use insights_config::*;
