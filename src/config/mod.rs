//! Configuration module for the weave service manager.
//!
//! Resolves weave-owned paths and loads optional TOML overrides.

mod settings;

pub use settings::*;
