//! Access token handling
//!
//! - [`Credential`]: the bearer token, zeroed in memory when dropped
//! - [`CredentialStore`]: encrypted (passphrase) and plaintext token files
//! - [`CredentialResolver`]: environment → encrypted file → plaintext file → prompt
//!
//! There is no process-wide token: the resolved [`Credential`] is owned by the
//! caller and lent by reference to the validator, record resolver and
//! download engine. Every exit path, including errors and interrupts, drops it.

pub mod crypto;
mod resolver;
mod store;

pub use resolver::{CredentialResolver, SaveChoice};
pub use store::{CredentialStore, StoredCredential};

use secrecy::{ExposeSecret, SecretString};

/// Bearer token for the remote service
pub struct Credential {
    secret: SecretString,
}

impl Credential {
    /// Wrap a token, trimming surrounding whitespace. Returns `None` for empty input.
    pub fn new(token: SecretString) -> Option<Self> {
        let trimmed = token.expose_secret().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            secret: SecretString::from(trimmed.to_string()),
        })
    }

    /// Wrap a token held in a plain string; the string is moved into secret storage
    pub fn from_string(token: String) -> Option<Self> {
        Self::new(SecretString::from(token))
    }

    /// Borrow the raw token for a request header or a store write
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Token length, the only property that is safe to log
    pub fn len(&self) -> usize {
        self.expose().len()
    }

    /// Always false; empty tokens are rejected on construction
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
