/// Failures of the authentication core.
///
/// The distinctions exist for logs and diagnostics. The HTTP layer collapses
/// every authentication failure into the same 401 response.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    HashingFailure(String),

    #[error("token signature invalid")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token claims malformed")]
    MalformedClaims,

    #[error("no bearer token provided")]
    MissingToken,

    #[error("refresh token not found")]
    NotFound,

    #[error("refresh token revoked")]
    Revoked,

    #[error("token signing failed: {0}")]
    TokenSigning(String),

    #[error("persistence error: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl AuthError {
    /// True for failures caused by the caller's credentials rather than by
    /// this server (storage, hashing or signing faults).
    pub fn is_unauthorized(&self) -> bool {
        !matches!(
            self,
            Self::HashingFailure(_) | Self::TokenSigning(_) | Self::Persistence(_)
        )
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
