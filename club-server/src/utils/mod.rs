//! Utilities
//!
//! - [`logger`] - tracing setup and log retention

pub mod logger;
