//! Numeric error codes shared by club-server and its clients
//!
//! The leading digit groups codes (see [`ErrorCategory`](super::ErrorCategory)).
//! Codes travel as bare `u16` in the response envelope, so a value once
//! published must never be reassigned.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares the code table once: variant, wire value and default message.
macro_rules! error_codes {
    ($($(#[$doc:meta])* $name:ident = $value:literal => $message:literal,)+) => {
        /// Code carried in the `code` field of an `ApiResponse`
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $($(#[$doc])* $name = $value,)+
        }

        impl ErrorCode {
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$name,)+];

            /// Message used when the error is raised without a custom one
            pub const fn message(&self) -> &'static str {
                match self {
                    $(Self::$name => $message,)+
                }
            }
        }
    };
}

error_codes! {
    Success = 0 => "OK",
    ValidationFailed = 2 => "Validation failed",
    /// Some document other than the ones with dedicated codes below
    NotFound = 3 => "Document not found",
    RequiredField = 7 => "Required field missing",

    NotAuthenticated = 1001 => "Sign-in required",
    TokenExpired = 1003 => "Token has expired",
    TokenInvalid = 1004 => "Token is invalid",
    /// Signed out, or the account behind the token is gone
    SessionExpired = 1005 => "Session has expired",

    PermissionDenied = 2001 => "Permission denied",
    ClubStaffRequired = 2006 => "Club staff or admin role required",
    /// Staff reviewing a request that belongs to another club
    ClubScopeViolation = 2007 => "Cannot act on a different club",

    RequestNotFound = 3001 => "Registration request not found",
    /// Already approved or rejected
    RequestNotPending = 3002 => "Registration request is not pending",
    DuplicatePendingRequest = 3003 => "A pending request already exists",

    MemberNotFound = 4001 => "Member not found",
    UserNotFound = 4002 => "User not found",
    UserAlreadyLinked = 4003 => "User is already linked to another member",
    MemberAlreadyLinked = 4004 => "Member is already linked to another user",
    NotLinked = 4005 => "User and member are not linked",

    InternalError = 9001 => "Internal server error",
    DatabaseError = 9002 => "Database error",
    /// Optimistic commit kept losing to concurrent writers
    TransactionContention = 9006 => "Too much contention, please retry",
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// A `u16` that names no [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown error code {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.code() == value)
            .ok_or(InvalidErrorCode(value))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
