//! # Auth Errors
//!
//! Error types for the authentication module. Display strings are the
//! messages clients see.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    // ==================
    // Credentials
    // ==================
    /// Login without email or password
    #[error("Please provide email and password!")]
    MissingCredentials,

    /// Unknown email or wrong password (deliberately indistinguishable)
    #[error("Incorrect email or password")]
    InvalidCredentials,

    /// Current password did not match on password update
    #[error("Your current password is wrong.")]
    WrongCurrentPassword,

    /// No user with the email given to forgot-password
    #[error("There is no user with that email address.")]
    UnknownEmail,

    // ==================
    // Token Gate
    // ==================
    /// No bearer header and no cookie
    #[error("You are not logged in! Please log in to get access.")]
    NotLoggedIn,

    /// JWT token is malformed
    #[error("Invalid token. Please log in again!")]
    MalformedToken,

    /// JWT signature is invalid
    #[error("Invalid token. Please log in again!")]
    InvalidSignature,

    /// JWT token has expired
    #[error("Your token has expired! Please log in again.")]
    TokenExpired,

    /// Token subject no longer exists or was deactivated
    #[error("The user belonging to this token does no longer exist.")]
    UserNoLongerExists,

    /// Password changed after the token was issued
    #[error("User recently changed password! Please log in again.")]
    PasswordChanged,

    /// Principal lacks the required role
    #[error("You do not have permission to perform this action")]
    Forbidden,

    // ==================
    // Password Reset
    // ==================
    /// Reset token unknown or past its expiry
    #[error("Token is invalid or has expired")]
    InvalidResetToken,

    // ==================
    // Internal Errors
    // ==================
    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            AuthError::MissingCredentials => 400,
            AuthError::InvalidResetToken => 400,

            // 401 Unauthorized
            AuthError::InvalidCredentials => 401,
            AuthError::WrongCurrentPassword => 401,
            AuthError::NotLoggedIn => 401,
            AuthError::MalformedToken => 401,
            AuthError::InvalidSignature => 401,
            AuthError::TokenExpired => 401,
            AuthError::UserNoLongerExists => 401,
            AuthError::PasswordChanged => 401,

            // 403 Forbidden
            AuthError::Forbidden => 403,

            // 404 Not Found
            AuthError::UnknownEmail => 404,

            // 500 Internal Server Error
            AuthError::HashingFailed => 500,
            AuthError::TokenGenerationFailed => 500,
        }
    }

    /// Returns whether this error should be logged at warn level
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
