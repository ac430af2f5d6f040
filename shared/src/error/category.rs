//! Coarse groupings of [`ErrorCode`]

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Which part of the system raised the error, from the code's leading digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    General,
    Auth,
    Permission,
    Registration,
    Member,
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code / 1000 {
            0 => Self::General,
            1 => Self::Auth,
            2 => Self::Permission,
            3 => Self::Registration,
            4 => Self::Member,
            _ => Self::System,
        }
    }
}

/// Failure taxonomy of the approval and linking protocol
///
/// Callers that only decide between "fix the input", "refresh and look
/// again" and "report it" match on this instead of the full code list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Target document absent
    NotFound,
    /// Request already approved or rejected, or an account already linked
    Conflict,
    /// Caller lacks the role, or is staff of another club
    Forbidden,
    /// Missing or malformed payload fields
    InvalidInput,
    Unauthenticated,
    /// Store or logic failure, including exhausted commit retries
    Internal,
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    pub fn kind(&self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            NotFound | RequestNotFound | MemberNotFound | UserNotFound => ErrorKind::NotFound,
            RequestNotPending | DuplicatePendingRequest | UserAlreadyLinked
            | MemberAlreadyLinked | NotLinked => ErrorKind::Conflict,
            PermissionDenied | ClubStaffRequired | ClubScopeViolation => ErrorKind::Forbidden,
            ValidationFailed | RequiredField => ErrorKind::InvalidInput,
            NotAuthenticated | TokenExpired | TokenInvalid | SessionExpired => {
                ErrorKind::Unauthenticated
            }
            Success | InternalError | DatabaseError | TransactionContention => ErrorKind::Internal,
        }
    }
}
