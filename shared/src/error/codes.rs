//! Unified error codes for the FreshCart core
//!
//! This module defines all error codes used across the server and its
//! clients. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Account & verification errors
//! - 4xxx: Order errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (email/password)
    InvalidCredentials = 1002,
    /// Access token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Refresh token has expired
    SessionExpired = 1005,
    /// Refresh token has been revoked (logout or password change)
    SessionRevoked = 1006,
    /// Password too short
    PasswordTooShort = 1007,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Specific role required
    RoleRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Account & verification ====================
    /// Account not found
    AccountNotFound = 3001,
    /// Email already registered
    EmailAlreadyRegistered = 3002,
    /// Verification code expired
    VerificationCodeExpired = 3003,
    /// Verification code invalid
    VerificationCodeInvalid = 3004,
    /// Too many verification attempts
    TooManyAttempts = 3005,
    /// Email not verified
    EmailNotVerified = 3006,
    /// Too many requests
    TooManyRequests = 3007,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order is empty
    OrderEmpty = 4002,
    /// Order item has invalid quantity
    InvalidQuantity = 4003,
    /// Requested status transition is not allowed
    IllegalTransition = 4004,
    /// Customer cancellation window has expired
    CancellationWindowExpired = 4005,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Backing store unavailable
    ServiceUnavailable = 9003,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",
            ErrorCode::SessionExpired => "Session has expired, please log in again",
            ErrorCode::SessionRevoked => "Session has been revoked, please log in again",
            ErrorCode::PasswordTooShort => "Password must be at least 6 characters",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoleRequired => "Specific role is required",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Account & verification
            ErrorCode::AccountNotFound => "Account not found",
            ErrorCode::EmailAlreadyRegistered => "Email is already registered",
            ErrorCode::VerificationCodeExpired => "Verification code has expired",
            ErrorCode::VerificationCodeInvalid => "Invalid verification code",
            ErrorCode::TooManyAttempts => "Too many attempts, request a new code",
            ErrorCode::EmailNotVerified => "Email not verified",
            ErrorCode::TooManyRequests => "Too many requests, try again later",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order must contain at least one item",
            ErrorCode::InvalidQuantity => "Order item quantity must be positive",
            ErrorCode::IllegalTransition => "Order status transition is not allowed",
            ErrorCode::CancellationWindowExpired => {
                "Cancel period expired, orders can only be cancelled within 2 minutes"
            }

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),
            1005 => Ok(ErrorCode::SessionExpired),
            1006 => Ok(ErrorCode::SessionRevoked),
            1007 => Ok(ErrorCode::PasswordTooShort),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoleRequired),
            2003 => Ok(ErrorCode::AdminRequired),

            // Account & verification
            3001 => Ok(ErrorCode::AccountNotFound),
            3002 => Ok(ErrorCode::EmailAlreadyRegistered),
            3003 => Ok(ErrorCode::VerificationCodeExpired),
            3004 => Ok(ErrorCode::VerificationCodeInvalid),
            3005 => Ok(ErrorCode::TooManyAttempts),
            3006 => Ok(ErrorCode::EmailNotVerified),
            3007 => Ok(ErrorCode::TooManyRequests),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderEmpty),
            4003 => Ok(ErrorCode::InvalidQuantity),
            4004 => Ok(ErrorCode::IllegalTransition),
            4005 => Ok(ErrorCode::CancellationWindowExpired),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::ServiceUnavailable),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
