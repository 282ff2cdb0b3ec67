//! Configuration management
//!
//! Node settings (addresses, data directory, proof-of-work target) loaded
//! from `ledger.toml` and the environment.

pub mod settings;

pub use settings::{Config, Settings, GLOBAL_CONFIG};
