//! OAuth2 client-credential flow against the Microsoft identity platform.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::TokenProvider;

/// Default identity platform authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Application-permission scope for Microsoft Graph.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on the lifetime trusted from `expires_in`.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// App registration credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub authority: String,
}

impl ClientCredentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    /// `{authority}/{tenant}/oauth2/v2.0/token`
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id.trim_end_matches('/')
        )
    }
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    error: Option<String>,
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Acquires app-only tokens and reuses them until shortly before expiry.
pub struct ClientCredentialProvider {
    client: Client,
    credentials: ClientCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialProvider {
    pub fn new(client: Client, credentials: ClientCredentials) -> Self {
        Self {
            client,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        let url = self.credentials.token_url();
        debug!("Requesting client-credential token from {}", url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
            ])
            .send()
            .await
            .context("Failed to send token request")?;

        let status = response.status();
        let parsed: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;

        match parsed.access_token {
            Some(token) if status.is_success() && !token.is_empty() => {
                let now = Instant::now();
                let lifetime = Duration::from_secs(parsed.expires_in).min(MAX_TOKEN_LIFETIME);
                Ok(CachedToken {
                    token,
                    // An unrepresentable expiry leaves the token uncached.
                    expires_at: now.checked_add(lifetime).unwrap_or(now),
                })
            }
            _ => {
                let reason = parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                Err(anyhow!("Failed to acquire access token: {}", reason))
            }
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref()
            && Instant::now() + EXPIRY_MARGIN < entry.expires_at
        {
            return Ok(entry.token.clone());
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn credentials(authority: &str) -> ClientCredentials {
        ClientCredentials::new("tenant-1", "client-1", "s3cret").with_authority(authority)
    }

    #[test]
    fn test_token_url() {
        let creds = ClientCredentials::new("contoso.onmicrosoft.com/", "c", "s");
        assert_eq!(
            creds.token_url(),
            "https://login.microsoftonline.com/contoso.onmicrosoft.com/oauth2/v2.0/token"
        );
    }

    #[tokio::test]
    async fn test_token_is_fetched_and_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "client-1".into()),
                Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
                Matcher::UrlEncoded("scope".into(), GRAPH_SCOPE.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"Bearer","expires_in":3599,"access_token":"tok-1"}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = ClientCredentialProvider::new(Client::new(), credentials(&server.url()));
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");
        assert_eq!(provider.access_token().await.unwrap(), "tok-1");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refetched() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":30,"access_token":"short"}"#)
            .expect(2)
            .create_async()
            .await;

        let provider = ClientCredentialProvider::new(Client::new(), credentials(&server.url()));
        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_huge_expires_in_is_capped_and_cached() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"expires_in":18446744073709551615,"access_token":"long"}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = ClientCredentialProvider::new(Client::new(), credentials(&server.url()));
        assert_eq!(provider.access_token().await.unwrap(), "long");
        assert_eq!(provider.access_token().await.unwrap(), "long");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_error_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/tenant-1/oauth2/v2.0/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client","error_description":"Bad secret"}"#)
            .create_async()
            .await;

        let provider = ClientCredentialProvider::new(Client::new(), credentials(&server.url()));
        let err = provider.access_token().await.unwrap_err();
        assert!(err.to_string().contains("Failed to acquire access token"));
        assert!(err.to_string().contains("Bad secret"));
    }
}
