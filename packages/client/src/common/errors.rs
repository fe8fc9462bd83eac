use thiserror::Error;

/// Errors surfaced to screens by the pasarin client core
///
/// Every variant maps to a user-visible outcome: none of these should crash
/// the app, and only `SessionExpired` changes global state (forced logout).
#[derive(Error, Debug)]
pub enum ClientError {
    /// Bad credentials or backend validation failure on login/register.
    /// Recoverable: the user may correct their input and retry.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The credential was invalidated mid-session. The session store has
    /// already cleared its state by the time this reaches a caller.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// A device capability (location, camera, microphone) was not granted.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// OTP verification attempted after the countdown ran out.
    #[error("Verification code expired, request a new one")]
    ExpiredCode,

    /// Local validation failure caught before any network call.
    #[error("Invalid input: {0}")]
    MalformedInput(String),

    /// Generic fetch/timeout failure. Recoverable; the user re-triggers
    /// the action, there is no automatic retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Local infrastructure failure (credential storage, config)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
