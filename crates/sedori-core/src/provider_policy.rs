use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};
use crate::ProviderId;

/// Batch shape imposed by one provider's API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPolicy {
    /// Provider cap on items per outbound request.
    pub max_batch_size: usize,
    /// Pause between consecutive batches, when the provider needs one.
    pub cooldown: Option<Duration>,
}

/// Quota accounting for providers that meter calls with a token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Estimated tokens per work item. An estimate, not exact accounting;
    /// the authoritative count is the provider's own report.
    pub cost_per_item: u32,
}

/// Per-provider parameters for the access layer: request pacing, retry
/// budget, batch shape and quota estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub requests_per_second: f64,
    pub window_seconds: f64,
    pub retry: RetryPolicy,
    pub batch: BatchPolicy,
    pub quota: Option<QuotaPolicy>,
}

impl ProviderPolicy {
    /// Yahoo Shopping item search: one request every two seconds, per-JAN
    /// calls.
    pub fn yahoo_default() -> Self {
        Self {
            provider_id: ProviderId::Yahoo,
            requests_per_second: 0.5,
            window_seconds: 2.0,
            retry: RetryPolicy::attempts(3),
            batch: BatchPolicy {
                max_batch_size: 1,
                cooldown: None,
            },
            quota: None,
        }
    }

    /// Rakuten Ichiba item search: one request per second, per-JAN calls.
    pub fn rakuten_default() -> Self {
        Self {
            provider_id: ProviderId::Rakuten,
            requests_per_second: 1.0,
            window_seconds: 2.0,
            retry: RetryPolicy::attempts(3),
            batch: BatchPolicy {
                max_batch_size: 1,
                cooldown: None,
            },
            quota: None,
        }
    }

    /// SP-API: the pricing batch endpoint caps at 20 ASINs per request and
    /// effectively one batch per ~31 seconds; quota is not self-reported,
    /// so budgeting is purely pre-estimated by the caller.
    pub fn sp_api_default() -> Self {
        Self {
            provider_id: ProviderId::SpApi,
            requests_per_second: 8.0,
            window_seconds: 2.0,
            retry: RetryPolicy {
                max_attempts: 5,
                backoff: Backoff::Exponential {
                    base: Duration::from_secs(2),
                    factor: 2.0,
                    max: Duration::from_secs(120),
                    jitter: false,
                },
            },
            batch: BatchPolicy {
                max_batch_size: 20,
                cooldown: Some(Duration::from_secs(31)),
            },
            quota: None,
        }
    }

    /// Keepa product queries: the token budget is reported back in every
    /// response, roughly one token per ASIN.
    pub fn keepa_default() -> Self {
        Self {
            provider_id: ProviderId::Keepa,
            requests_per_second: 5.0,
            window_seconds: 2.0,
            retry: RetryPolicy::attempts(3),
            batch: BatchPolicy {
                max_batch_size: 100,
                cooldown: None,
            },
            quota: Some(QuotaPolicy { cost_per_item: 1 }),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Yahoo => Self::yahoo_default(),
            ProviderId::Rakuten => Self::rakuten_default(),
            ProviderId::SpApi => Self::sp_api_default(),
            ProviderId::Keepa => Self::keepa_default(),
        }
    }

    /// Minimum spacing between requests implied by the configured rate.
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second.max(f64::MIN_POSITIVE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yahoo_policy_spaces_requests_two_seconds_apart() {
        let policy = ProviderPolicy::yahoo_default();

        assert_eq!(policy.provider_id, ProviderId::Yahoo);
        assert_eq!(policy.min_interval(), Duration::from_secs(2));
        assert_eq!(policy.batch.max_batch_size, 1);
        assert!(policy.quota.is_none());
    }

    #[test]
    fn sp_api_policy_matches_pricing_batch_limits() {
        let policy = ProviderPolicy::sp_api_default();

        assert_eq!(policy.retry.max_attempts, 5);
        assert_eq!(policy.batch.max_batch_size, 20);
        assert_eq!(policy.batch.cooldown, Some(Duration::from_secs(31)));
        assert!(policy.quota.is_none());
    }

    #[test]
    fn keepa_policy_meters_one_token_per_item() {
        let policy = ProviderPolicy::keepa_default();

        assert_eq!(policy.quota, Some(QuotaPolicy { cost_per_item: 1 }));
        assert_eq!(policy.batch.max_batch_size, 100);
    }

    #[test]
    fn default_for_covers_every_provider() {
        for provider in ProviderId::ALL {
            assert_eq!(ProviderPolicy::default_for(provider).provider_id, provider);
        }
    }
}
