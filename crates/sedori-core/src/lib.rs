//! Core contracts for sedori.
//!
//! This crate contains the resilient access layer shared by every external
//! commerce API integration:
//! - Product identifier domain types and validation
//! - Per-provider pacing, retry, batch and quota policies
//! - The rate gate, credential lifecycle and token-budget guard
//! - The retrying request executor and batch orchestrator
//! - Provider adapters (Yahoo Shopping, Rakuten Ichiba, SP-API, Keepa)

pub mod adapters;
pub mod batch;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod provider_policy;
pub mod quota;
pub mod retry;
pub mod source;
pub mod throttling;

pub use adapters::{KeepaAdapter, RakutenIchibaAdapter, SpApiAdapter, YahooShoppingAdapter};
pub use batch::{BatchOrchestrator, BatchRun, ItemOutcome, RunStatus};
pub use config::{
    in_serverless_runtime, sp_api_requests_per_second, ProviderSecrets, SpApiSecrets,
};
pub use credentials::{Credential, CredentialLifecycle, RefreshSecrets};
pub use domain::{
    Asin, CatalogItem, JanCode, ListingHit, PricingSummary, ProductCode, ProductSnapshot,
    ShippingCondition,
};
pub use error::{AccessError, ValidationError};
pub use executor::RequestExecutor;
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use provider_policy::{BatchPolicy, ProviderPolicy, QuotaPolicy};
pub use quota::{QuotaSnapshot, TokenBudgetGuard};
pub use retry::{Backoff, FailureKind, RetryPolicy};
pub use source::ProviderId;
pub use throttling::RateGate;
