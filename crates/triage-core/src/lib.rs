//! Core types, configuration, and canonical serialization for the triage console
//!
//! This crate provides:
//! - Configuration management (`Config`, environment parsing)
//! - Stable JSON serialization used for cache keys and change detection
//! - Debounce / throttle gates driven by caller clocks
//! - Common error types

#![forbid(unsafe_code)]

pub mod canonical;
pub mod config;
pub mod debounce;
pub mod error;

// Re-export key types for convenience
pub use canonical::{date_value, iso_timestamp, stable_stringify, stable_stringify_value};
pub use config::Config;
pub use debounce::{Debouncer, Throttler};
pub use error::{Error, Result};
