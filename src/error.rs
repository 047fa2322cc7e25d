use thiserror::Error;

use crate::models::Role;

/// Failures a caller may want to tell apart. Everything else travels as a plain
/// `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("You need to log in first")]
    NotLoggedIn,

    #[error("This command requires the {} role", .0.as_str())]
    Forbidden(Role),

    #[error("SMS gateway is not configured (set SENDCHAMP_API_KEY)")]
    GatewayNotConfigured,

    #[error("No student found for {0}")]
    UnknownStudent(String),

    #[error("No course found with code {0}")]
    UnknownCourse(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("An account with email {0} already exists")]
    DuplicateEmail(String),
}
