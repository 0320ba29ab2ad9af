//! Bearer token acquisition.
//!
//! The HTTP client asks a [`TokenProvider`] for a token on every request attempt and
//! never caches tokens itself. Providers decide whether to cache.

mod client_credentials;
mod session;

use anyhow::Result;
use async_trait::async_trait;

pub use client_credentials::{
    ClientCredentialProvider, ClientCredentials, DEFAULT_AUTHORITY, GRAPH_SCOPE,
};
pub use session::{ProviderFingerprint, ProviderSession};

/// Source of bearer tokens for Graph requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid bearer token. Failures propagate to the caller unclassified.
    async fn access_token(&self) -> Result<String>;
}

/// A pre-acquired token, e.g. from `SHAREPOINT_ACCESS_TOKEN`.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
