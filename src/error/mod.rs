//! Error types for the weave service manager.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
