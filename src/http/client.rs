//! Authenticated Graph request client with throttling retries.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use reqwest::{
    Client, Method, StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::TokenProvider;

use super::error::{GraphError, GraphErrorResponse, parse_graph_error};
use super::retry::{RetryOptions, calculate_backoff, sleep};

/// Method, body and extra headers for a single logical request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    /// Applied after the default headers, so they win on conflict.
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn patch(body: Value) -> Self {
        Self {
            method: Method::PATCH,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// HTTP client that authenticates every attempt and retries throttled responses.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryOptions,
}

impl HttpClient {
    /// Creates a client with the default retry envelope.
    pub fn new(client: Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            tokens,
            retry: RetryOptions::default(),
        }
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_options(&self) -> RetryOptions {
        self.retry
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Sends one logical request and deserializes the JSON response as-is.
    ///
    /// A 204 response deserializes `R` from `null`, so `()` and `Option<T>` work for
    /// bodiless calls. Non-2xx responses become a [`GraphError`]; only throttling is
    /// retried, up to `max_retries` times.
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request<R: DeserializeOwned>(&self, url: &str, options: RequestOptions) -> Result<R> {
        let mut last_error: Option<GraphError> = None;

        for attempt in 0..=self.retry.max_retries {
            let token = self
                .tokens
                .access_token()
                .await
                .context("Failed to obtain access token")?;

            let error = match self.send_once(url, &options, &token).await? {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match error.retry_after() {
                Some(retry_after) if attempt < self.retry.max_retries => {
                    let wait_ms = if retry_after > 0 {
                        retry_after.saturating_mul(1000).min(self.retry.max_delay)
                    } else {
                        calculate_backoff(attempt, self.retry.base_delay, self.retry.max_delay)
                            as u64
                    };
                    warn!(
                        "{} {}: throttled (attempt {}/{}), retrying in {}ms...",
                        options.method,
                        url,
                        attempt + 1,
                        self.retry.max_retries + 1,
                        wait_ms
                    );
                    sleep(wait_ms).await;
                    last_error = Some(error);
                }
                _ => {
                    debug!("{} {}: {} ({})", options.method, url, error.name(), error.status);
                    return Err(error.into());
                }
            }
        }

        Err(last_error
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow!("Max retries exceeded")))
    }

    /// Single attempt. The outer `Result` carries transport failures, the inner one
    /// classified service errors.
    async fn send_once<R: DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
        token: &str,
    ) -> Result<std::result::Result<R, GraphError>> {
        let headers = merge_headers(token, &options.headers)?;
        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(serde_json::to_vec(body).context("Failed to encode request body")?);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;
        let status = response.status();

        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Ok(serde_json::from_value(Value::Null)
                    .context("Expected a response body but got 204 No Content")?));
            }
            let value = response
                .json::<R>()
                .await
                .context("Failed to parse JSON response from Graph API")?;
            return Ok(Ok(value));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response
            .json::<GraphErrorResponse>()
            .await
            .unwrap_or_else(|_| GraphErrorResponse::synthetic(status_text));

        Ok(Err(parse_graph_error(
            status.as_u16(),
            &body,
            retry_after.as_deref(),
        )))
    }
}

/// Default headers first, then caller headers on top.
fn merge_headers(token: &str, extra: &HeaderMap) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
        .context("Access token contains invalid header characters")?;
    auth_value.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth_value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in extra {
        headers.insert(name.clone(), value.clone());
    }

    Ok(headers)
}
