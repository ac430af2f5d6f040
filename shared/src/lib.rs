//! Shared types for the club membership workspace
//!
//! Domain models, the unified error system and the document-store wire
//! types used by both the server and the realtime client.

pub mod error;
pub mod models;
pub mod store;
pub mod util;

// Re-exports
pub use axum::Json;
pub use error::{ApiResponse, AppError, AppResult, ErrorCode, ErrorKind};
pub use http;
pub use serde::{Deserialize, Serialize};
