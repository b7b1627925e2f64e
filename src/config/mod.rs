//! Plant Configuration Module
//!
//! Operator-tunable targets, formula constants and service settings loaded
//! from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `CEMENT_OPS_CONFIG` environment variable (path to TOML file)
//! 3. `plant_config.toml` in the current working directory
//! 4. Built-in defaults
//!
//! Environment overrides (`DATABASE_URL`, `PORT`, `BIND_ADDRESS`,
//! `CORS_ORIGINS`, the LLM key) are applied on top by
//! [`PlantConfig::apply_env_overrides`].
//!
//! The loaded config is shared read-only through the HTTP state; there is
//! no global.

pub mod defaults;
mod plant_config;
pub mod validation;

pub use plant_config::*;
