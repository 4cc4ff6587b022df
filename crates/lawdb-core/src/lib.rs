//! lawdb-core
//!
//! Shared domain types, the error taxonomy, provider traits, configuration
//! and the statute corpus loader used by every other `lawdb-*` crate.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
