use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::credentials::CredentialLifecycle;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::provider_policy::ProviderPolicy;
use crate::retry::{classify_response, classify_transport, FailureKind, RetryPolicy};
use crate::throttling::RateGate;
use crate::{AccessError, ProviderId};

/// Executes one logical provider call with throttling, credential upkeep
/// and classified retries.
///
/// Before every attempt the executor passes the rate gate and (when the
/// provider authenticates with short-lived tokens) stamps a fresh
/// credential header; these are preconditions, not alternatives to retry.
/// At most one credential refresh is performed per logical call: a second
/// consecutive auth failure follows the ordinary backoff path instead of
/// refreshing indefinitely.
#[derive(Clone)]
pub struct RequestExecutor {
    provider: ProviderId,
    gate: Arc<RateGate>,
    credentials: Option<Arc<CredentialLifecycle>>,
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
}

impl RequestExecutor {
    pub fn from_policy(policy: &ProviderPolicy, http: Arc<dyn HttpClient>) -> Self {
        Self {
            provider: policy.provider_id,
            gate: Arc::new(RateGate::from_policy(policy)),
            credentials: None,
            http,
            retry: policy.retry,
        }
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialLifecycle>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Runs the request until a 2xx response, a fatal error, or attempt
    /// exhaustion. Exhaustion surfaces as an item-scoped terminal error.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, AccessError> {
        let mut refreshed = false;
        let mut last_failure = None;
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            self.gate.acquire().await;

            let mut attempt_request = request.clone();
            if let Some(credentials) = &self.credentials {
                let credential = credentials.ensure_valid().await?;
                let auth = HttpAuth::Header {
                    name: credentials.header_name().to_owned(),
                    value: credential.access_token,
                };
                auth.apply(&mut attempt_request.headers);
            }

            let failure = match self.http.execute(attempt_request).await {
                Ok(response) => match classify_response(&response) {
                    None => {
                        tracing::debug!(
                            provider = %self.provider,
                            attempt,
                            status = response.status,
                            "request succeeded"
                        );
                        return Ok(response);
                    }
                    Some(failure) => failure,
                },
                Err(error) if !error.retryable() => {
                    return Err(AccessError::Transport {
                        provider: self.provider,
                        attempts: attempt + 1,
                        message: error.message().to_owned(),
                    });
                }
                Err(error) => classify_transport(&error),
            };

            let is_last = attempt + 1 >= max_attempts;
            tracing::warn!(
                provider = %self.provider,
                attempt = attempt + 1,
                max_attempts,
                failure = ?failure,
                "attempt failed"
            );

            match &failure {
                FailureKind::RateLimited { retry_after } => {
                    if !is_last {
                        let delay =
                            retry_after.unwrap_or_else(|| self.retry.delay_for_attempt(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
                FailureKind::AuthExpired { .. } => {
                    match &self.credentials {
                        Some(credentials) if !refreshed => {
                            refreshed = true;
                            credentials.invalidate_and_refresh().await?;
                            if !is_last {
                                tokio::time::sleep(self.retry.backoff.base()).await;
                            }
                        }
                        _ => {
                            if !is_last {
                                tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                            }
                        }
                    }
                }
                FailureKind::Upstream { .. } | FailureKind::Transport { .. } => {
                    if !is_last {
                        tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    }
                }
            }

            last_failure = Some(failure);
        }

        Err(self.terminal_error(last_failure, max_attempts))
    }

    /// Runs the request and decodes a 2xx body as JSON.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, AccessError> {
        let response = self.execute(request).await?;
        serde_json::from_str(&response.body).map_err(|error| AccessError::Decode {
            provider: self.provider,
            message: error.to_string(),
        })
    }

    fn terminal_error(&self, last_failure: Option<FailureKind>, attempts: u32) -> AccessError {
        match last_failure {
            Some(FailureKind::RateLimited { .. }) => AccessError::UpstreamStatus {
                provider: self.provider,
                status: 429,
                attempts,
            },
            Some(FailureKind::AuthExpired { status })
            | Some(FailureKind::Upstream { status }) => AccessError::UpstreamStatus {
                provider: self.provider,
                status,
                attempts,
            },
            Some(FailureKind::Transport { message }) => AccessError::Transport {
                provider: self.provider,
                attempts,
                message,
            },
            None => AccessError::Transport {
                provider: self.provider,
                attempts,
                message: String::from("no attempt was made"),
            },
        }
    }
}
