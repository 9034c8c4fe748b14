//! Error types for GitHub OAuth operations

/// Errors from the token exchange.
///
/// `Provider` means GitHub answered with a recognizable error payload
/// (`error` + `error_description`); `Transport` covers connection failures
/// and bodies that don't parse; `MissingToken` is a well-formed response
/// that simply lacks `access_token`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("token response missing access_token")]
    MissingToken,
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
