//! Caller-owned reuse of credential providers.
//!
//! A provider is reused while the credential fingerprint stays the same and replaced
//! when it changes. There is no process-wide instance; whoever owns the session
//! decides its lifetime.

use std::sync::Arc;

use log::debug;
use reqwest::Client;

use super::{ClientCredentialProvider, ClientCredentials};

/// Identity of a provider: tenant, client and authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderFingerprint {
    pub tenant_id: String,
    pub client_id: String,
    pub authority: String,
}

impl From<&ClientCredentials> for ProviderFingerprint {
    fn from(credentials: &ClientCredentials) -> Self {
        Self {
            tenant_id: credentials.tenant_id.trim_end_matches('/').to_string(),
            client_id: credentials.client_id.clone(),
            authority: credentials.authority.trim_end_matches('/').to_string(),
        }
    }
}

/// Holds at most one provider, keyed by its fingerprint.
pub struct ProviderSession {
    client: Client,
    current: Option<(ProviderFingerprint, Arc<ClientCredentialProvider>)>,
}

impl ProviderSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            current: None,
        }
    }

    /// Returns the cached provider when `credentials` match its fingerprint,
    /// otherwise builds a new one and replaces the cached entry.
    pub fn provider(&mut self, credentials: &ClientCredentials) -> Arc<ClientCredentialProvider> {
        let fingerprint = ProviderFingerprint::from(credentials);

        if let Some((key, provider)) = &self.current
            && *key == fingerprint
            && provider.credentials().client_secret == credentials.client_secret
        {
            return Arc::clone(provider);
        }

        debug!(
            "Creating credential provider for tenant {} / client {}",
            fingerprint.tenant_id, fingerprint.client_id
        );
        let provider = Arc::new(ClientCredentialProvider::new(
            self.client.clone(),
            credentials.clone(),
        ));
        self.current = Some((fingerprint, Arc::clone(&provider)));
        provider
    }

    /// Drops the cached provider.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn fingerprint(&self) -> Option<&ProviderFingerprint> {
        self.current.as_ref().map(|(key, _)| key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_fingerprint_reuses_provider() {
        let mut session = ProviderSession::new(Client::new());
        let creds = ClientCredentials::new("t", "c", "s");

        let first = session.provider(&creds);
        let second = session.provider(&creds);

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_trailing_slash_does_not_change_fingerprint() {
        let mut session = ProviderSession::new(Client::new());
        let first = session.provider(&ClientCredentials::new("t", "c", "s"));
        let second = session.provider(&ClientCredentials::new("t/", "c", "s"));

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_fingerprint_replaces_provider() {
        let mut session = ProviderSession::new(Client::new());
        let first = session.provider(&ClientCredentials::new("t", "c", "s"));
        let second = session.provider(&ClientCredentials::new("t", "other", "s"));

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(session.fingerprint().unwrap().client_id, "other");

        let third = session.provider(&ClientCredentials::new("t", "c", "s"));
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_rotated_secret_replaces_provider() {
        let mut session = ProviderSession::new(Client::new());
        let first = session.provider(&ClientCredentials::new("t", "c", "old"));
        let second = session.provider(&ClientCredentials::new("t", "c", "new"));

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_invalidate() {
        let mut session = ProviderSession::new(Client::new());
        let first = session.provider(&ClientCredentials::new("t", "c", "s"));
        session.invalidate();
        assert!(session.fingerprint().is_none());

        let second = session.provider(&ClientCredentials::new("t", "c", "s"));
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
