//! Errors raised by club operations and the envelope they are reported in
//!
//! Every failure carries an [`ErrorCode`]. The code determines its
//! [`ErrorKind`] in the approval protocol and its HTTP status.
//!
//! ```
//! use shared::error::{ApiResponse, AppError, ErrorCode, ErrorKind};
//!
//! let err = AppError::new(ErrorCode::RequestNotPending).with_detail("status", "approved");
//! assert_eq!(err.kind(), ErrorKind::Conflict);
//! assert_eq!(ApiResponse::<()>::error(&err).code, Some(3002));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::{ErrorCategory, ErrorKind};
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult, Details};
