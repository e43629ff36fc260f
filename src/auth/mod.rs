use async_trait::async_trait;
use thiserror::Error;

mod claims;
pub(crate) mod extractors;
pub mod jwks;

pub use extractors::AuthUser;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("no signing key for kid {0}")]
    UnknownKey(String),

    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("token has no subject")]
    MissingSubject,

    #[error("jwks unavailable: {0:#}")]
    KeySet(anyhow::Error),
}

/// Resolves a bearer token to the id of the user it was issued to.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AuthError>;
}
