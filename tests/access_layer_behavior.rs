//! Behavior-driven tests for the access layer.
//!
//! These tests verify HOW the layer behaves under provider pressure:
//! rate-limit pacing, Retry-After precedence, credential refresh and
//! retry exhaustion.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use sedori_core::{
    AccessError, Backoff, CredentialLifecycle, HttpClient, HttpError, HttpRequest, HttpResponse,
    ProviderPolicy, RateGate, RefreshSecrets, RequestExecutor, RetryPolicy,
};

// =============================================================================
// Test doubles
// =============================================================================

struct ScriptedHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    fn new(script: Vec<Result<HttpResponse, HttpError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("not poisoned").len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests.lock().expect("not poisoned").push(request);
        let outcome = self
            .script
            .lock()
            .expect("not poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(HttpError::new("script exhausted")));
        Box::pin(async move { outcome })
    }
}

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

fn fast_executor(max_attempts: u32, http: Arc<dyn HttpClient>) -> RequestExecutor {
    let policy = ProviderPolicy {
        retry: RetryPolicy::attempts(max_attempts).with_backoff(Backoff::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(120),
            jitter: false,
        }),
        ..ProviderPolicy::sp_api_default()
    };
    RequestExecutor::from_policy(&policy, http)
}

fn lifecycle(endpoint: Arc<CountingTokenEndpoint>) -> Arc<CredentialLifecycle> {
    Arc::new(CredentialLifecycle::new(
        endpoint,
        "https://auth.example.test/o2/token",
        RefreshSecrets {
            client_id: String::from("client"),
            client_secret: String::from("secret"),
            refresh_token: String::from("refresh"),
        },
        "x-amz-access-token",
    ))
}

// =============================================================================
// Rate gate pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_gate_is_hammered_requests_stay_spaced_by_min_interval() {
    // Given: an 8-requests-per-second gate with a 2-second window
    let gate = RateGate::new(8.0, 2.0);

    // When: 16 acquires are issued back to back
    let started = Instant::now();
    for _ in 0..16 {
        gate.acquire().await;
    }

    // Then: the 16th call lands at least a second after the 1st
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn when_calls_go_through_the_executor_the_gate_paces_them() {
    // Given: an executor whose policy paces 8 requests per second
    let http = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json("{}")),
        Ok(HttpResponse::ok_json("{}")),
        Ok(HttpResponse::ok_json("{}")),
    ]);
    let executor = fast_executor(3, http);

    // When: three successful calls run in sequence
    let started = Instant::now();
    for _ in 0..3 {
        executor
            .execute(HttpRequest::get("https://api.example.test/items"))
            .await
            .expect("call should succeed");
    }

    // Then: the gate inserted at least two 125ms gaps
    assert!(started.elapsed() >= Duration::from_millis(250));
}

// =============================================================================
// Retry-After precedence
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_the_provider_sends_retry_after_it_overrides_backoff() {
    // Given: a provider that rate-limits with an explicit 5 second wait
    let http = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(429, "").with_header("retry-after", "5")),
        Ok(HttpResponse::ok_json("{}")),
    ]);
    let executor = fast_executor(5, http.clone());

    // When: the call is executed
    let started = Instant::now();
    let response = executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect("rate limit should be retried away");

    // Then: the retry happened no earlier than 5 seconds later and the
    // rate limit never surfaced as an error
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(response.status, 200);
    assert_eq!(http.request_count(), 2);
}

// =============================================================================
// Credential lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_a_token_expires_exactly_one_refresh_precedes_the_retry() {
    // Given: a provider that rejects the first token as expired
    let token_endpoint = CountingTokenEndpoint::new(200);
    let http = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(403, "request token has expired")),
        Ok(HttpResponse::ok_json("{}")),
    ]);
    let executor = fast_executor(5, http.clone()).with_credentials(lifecycle(token_endpoint.clone()));

    // When: the call is executed
    executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect("refresh then retry should succeed");

    // Then: one initial grant plus exactly one forced refresh
    assert_eq!(token_endpoint.calls(), 2);
    assert_eq!(http.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn when_auth_fails_twice_the_second_failure_follows_plain_backoff() {
    // Given: two consecutive auth failures before recovery
    let token_endpoint = CountingTokenEndpoint::new(200);
    let http = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(403, "request token has expired")),
        Ok(HttpResponse::new(403, "request token has expired")),
        Ok(HttpResponse::ok_json("{}")),
    ]);
    let executor = fast_executor(5, http.clone()).with_credentials(lifecycle(token_endpoint.clone()));

    // When: the call is executed
    executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect("third attempt should succeed");

    // Then: the refresh happened once, not per failure
    assert_eq!(token_endpoint.calls(), 2);
    assert_eq!(http.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn when_the_token_endpoint_rejects_the_grant_the_error_is_fatal() {
    // Given: a token endpoint that rejects the refresh grant
    let token_endpoint = CountingTokenEndpoint::new(400);
    let http = ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json("{}"))]);
    let executor = fast_executor(5, http).with_credentials(lifecycle(token_endpoint));

    // When: the call is executed
    let error = executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect_err("grant rejection must surface");

    // Then: the failure is configuration-class and aborts the run
    assert!(matches!(error, AccessError::CredentialRefresh(_)));
    assert!(error.is_fatal());
}

// =============================================================================
// Retry exhaustion
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_server_errors_persist_the_failure_is_item_scoped() {
    // Given: a provider that only ever returns 500s
    let http = ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(500, "internal")),
        Ok(HttpResponse::new(500, "internal")),
        Ok(HttpResponse::new(500, "internal")),
    ]);
    let executor = fast_executor(3, http.clone());

    // When: the call exhausts its retries
    let error = executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect_err("exhaustion must fail");

    // Then: every attempt went out, and the terminal error does not abort
    // a surrounding run
    assert_eq!(http.request_count(), 3);
    assert!(matches!(
        error,
        AccessError::UpstreamStatus {
            status: 500,
            attempts: 3,
            ..
        }
    ));
    assert!(!error.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn when_the_network_drops_the_executor_backs_off_then_recovers() {
    // Given: one transport failure followed by success
    let http = ScriptedHttpClient::new(vec![
        Err(HttpError::new("connection reset by peer")),
        Ok(HttpResponse::ok_json("{}")),
    ]);
    let executor = fast_executor(3, http.clone());

    // When: the call is executed
    let started = Instant::now();
    executor
        .execute(HttpRequest::get("https://api.example.test/items"))
        .await
        .expect("transient network failure should be retried away");

    // Then: the retry waited at least the base delay
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(http.request_count(), 2);
}
