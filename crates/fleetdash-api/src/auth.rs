use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Source of the bearer credential attached to REST calls.
///
/// Token acquisition and storage live outside this crate; the client only
/// asks for the current token right before each request, so a provider
/// that rotates tokens is picked up without rebuilding the client.
pub trait CredentialProvider: Send + Sync {
    /// The current bearer token, or `None` when the caller is anonymous.
    fn bearer_token(&self) -> Result<Option<SecretString>, Error>;
}

/// A fixed token handed in at construction time.
#[derive(Clone)]
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(****)")
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Result<Option<SecretString>, Error> {
        if self.0.expose_secret().is_empty() {
            return Err(Error::MissingCredential("configured token is empty".into()));
        }
        Ok(Some(self.0.clone()))
    }
}

/// No credential: requests go out without an `Authorization` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn bearer_token(&self) -> Result<Option<SecretString>, Error> {
        Ok(None)
    }
}

/// Render the `Authorization` header value for a token.
pub(crate) fn bearer_header(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
