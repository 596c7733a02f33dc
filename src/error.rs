// src/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

/// Failures of the trading rules themselves. Always shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    UnknownSymbol,
    InsufficientFunds,
    InsufficientShares,
    UsernameTaken,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DomainError::UnknownSymbol => "Invalid Symbol",
            DomainError::InsufficientFunds => "Insufficient Cash",
            DomainError::InsufficientShares => "You don't have enough shares",
            DomainError::UsernameTaken => "Username Taken",
        };
        f.write_str(message)
    }
}

#[derive(Debug)]
pub enum AppError {
    /// Missing or malformed form input.
    Validation(String),
    /// Bad credentials.
    Auth(String),
    /// No valid session on a protected route.
    Unauthenticated,
    Domain(DomainError),
    /// The quote provider could not be reached or answered garbage.
    Upstream(String),
    Storage(String),
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Domain(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::SEE_OTHER,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text that is safe to put in front of the user. Storage and internal
    /// details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(m) | AppError::Auth(m) => m.clone(),
            AppError::Unauthenticated => "login required".to_string(),
            AppError::Domain(e) => e.to_string(),
            AppError::Upstream(_) => "Quote service unavailable".to_string(),
            AppError::Storage(_) | AppError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(m) => write!(f, "validation error: {}", m),
            AppError::Auth(m) => write!(f, "auth error: {}", m),
            AppError::Unauthenticated => write!(f, "no valid session"),
            AppError::Domain(e) => write!(f, "{}", e),
            AppError::Upstream(m) => write!(f, "quote provider error: {}", m),
            AppError::Storage(m) => write!(f, "storage error: {}", m),
            AppError::Internal(m) => write!(f, "internal error: {}", m),
        }
    }
}

impl std::error::Error for AppError {}

impl Reject for AppError {}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        AppError::Domain(e)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(e.to_string())
    }
}
