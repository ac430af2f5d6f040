//! Server configuration, shared state and startup
//!
//! - [`Config`] - environment driven settings
//! - [`ServerState`] - handles shared by request handlers
//! - [`Server`] - HTTP listener lifecycle

pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
