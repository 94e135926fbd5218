use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::http_client::{HttpClient, HttpRequest};
use crate::AccessError;

/// Default lifetime assumed for an access token when the token endpoint
/// does not report one.
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A token is replaced this long before its nominal expiry.
const SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// Long-lived secrets used to mint short-lived access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// An issued bearer credential with its assumed lifetime.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    issued_at: Instant,
    ttl: Duration,
}

impl Credential {
    fn new(access_token: String, ttl: Duration) -> Self {
        Self {
            access_token,
            issued_at: Instant::now(),
            ttl,
        }
    }

    /// A credential past `ttl - safety margin` must be replaced before use.
    fn is_fresh(&self) -> bool {
        self.issued_at.elapsed() < self.ttl.saturating_sub(SAFETY_MARGIN)
    }
}

#[derive(Debug, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Acquires and proactively refreshes bearer credentials.
///
/// State machine: fresh -> (elapsed > ttl - margin) -> stale -> refresh
/// -> fresh. A refresh failure indicates a configuration problem and is
/// surfaced, never retried in a loop. Tokens live in memory only.
pub struct CredentialLifecycle {
    http: Arc<dyn HttpClient>,
    token_url: String,
    secrets: RefreshSecrets,
    header_name: String,
    current: Mutex<Option<Credential>>,
}

impl CredentialLifecycle {
    pub fn new(
        http: Arc<dyn HttpClient>,
        token_url: impl Into<String>,
        secrets: RefreshSecrets,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            secrets,
            header_name: header_name.into(),
            current: Mutex::new(None),
        }
    }

    /// Request header carrying the access token (`x-amz-access-token` for
    /// SP-API).
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Returns a usable credential, refreshing transparently if the cached
    /// one is stale. Two immediate calls return the same token without a
    /// second grant request.
    pub async fn ensure_valid(&self) -> Result<Credential, AccessError> {
        {
            let current = self
                .current
                .lock()
                .expect("credential cache should not be poisoned");
            if let Some(credential) = current.as_ref() {
                if credential.is_fresh() {
                    return Ok(credential.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Forces a refresh regardless of apparent TTL. Used after an explicit
    /// auth-failure signal from the provider.
    pub async fn invalidate_and_refresh(&self) -> Result<Credential, AccessError> {
        {
            let mut current = self
                .current
                .lock()
                .expect("credential cache should not be poisoned");
            *current = None;
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<Credential, AccessError> {
        let request = HttpRequest::post(&self.token_url).with_form_body(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", &self.secrets.refresh_token),
            ("client_id", &self.secrets.client_id),
            ("client_secret", &self.secrets.client_secret),
        ]);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|error| AccessError::CredentialRefresh(error.message().to_owned()))?;

        if !response.is_success() {
            return Err(AccessError::CredentialRefresh(format!(
                "token endpoint returned status {}",
                response.status
            )));
        }

        let grant: TokenGrantResponse = serde_json::from_str(&response.body)
            .map_err(|error| AccessError::CredentialRefresh(error.to_string()))?;

        let ttl = grant
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TTL);
        let credential = Credential::new(grant.access_token, ttl);

        tracing::info!(ttl_secs = ttl.as_secs(), "access token refreshed");

        let mut current = self
            .current
            .lock()
            .expect("credential cache should not be poisoned");
        *current = Some(credential.clone());
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTokenEndpoint {
        calls: AtomicUsize,
        status: u16,
    }

    impl CountingTokenEndpoint {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                status,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpClient for CountingTokenEndpoint {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let issued = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.status;
            Box::pin(async move {
                Ok(HttpResponse::new(
                    status,
                    format!(r#"{{"access_token":"token-{issued}","expires_in":3600}}"#),
                ))
            })
        }
    }

    fn lifecycle(endpoint: Arc<CountingTokenEndpoint>) -> CredentialLifecycle {
        CredentialLifecycle::new(
            endpoint,
            "https://auth.example.test/o2/token",
            RefreshSecrets {
                client_id: String::from("client"),
                client_secret: String::from("secret"),
                refresh_token: String::from("refresh"),
            },
            "x-amz-access-token",
        )
    }

    #[tokio::test]
    async fn ensure_valid_is_idempotent_while_fresh() {
        let endpoint = CountingTokenEndpoint::new(200);
        let lifecycle = lifecycle(endpoint.clone());

        let first = lifecycle.ensure_valid().await.expect("first token");
        let second = lifecycle.ensure_valid().await.expect("second token");

        assert_eq!(first.access_token, second.access_token);
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_credential_is_replaced_before_expiry() {
        let endpoint = CountingTokenEndpoint::new(200);
        let lifecycle = lifecycle(endpoint.clone());

        let first = lifecycle.ensure_valid().await.expect("first token");

        // Past ttl - margin (3600 - 300 seconds) the token counts as stale.
        tokio::time::advance(Duration::from_secs(3301)).await;
        let second = lifecycle.ensure_valid().await.expect("replacement token");

        assert_ne!(first.access_token, second.access_token);
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_and_refresh_ignores_remaining_ttl() {
        let endpoint = CountingTokenEndpoint::new(200);
        let lifecycle = lifecycle(endpoint.clone());

        let first = lifecycle.ensure_valid().await.expect("first token");
        let second = lifecycle
            .invalidate_and_refresh()
            .await
            .expect("forced refresh");

        assert_ne!(first.access_token, second.access_token);
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn rejected_grant_is_a_fatal_refresh_error() {
        let endpoint = CountingTokenEndpoint::new(400);
        let lifecycle = lifecycle(endpoint);

        let error = lifecycle.ensure_valid().await.expect_err("must fail");
        assert!(matches!(error, AccessError::CredentialRefresh(_)));
        assert!(error.is_fatal());
    }
}
