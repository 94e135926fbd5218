use std::time::Duration;

use crate::http_client::{HttpError, HttpResponse};

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed { delay: Duration },
    /// Exponential delay: `base * (factor ^ attempt)`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        /// Apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(120),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay for a 0-based retry attempt.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }

    /// Base delay before any exponential scaling. Used for the fixed pause
    /// after a credential refresh.
    pub const fn base(self) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { base, .. } => base,
        }
    }
}

/// Retry budget and pacing for one provider's executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per logical call (first try included).
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Classified failure of one attempt, driving the retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// 429: sleep for `Retry-After` when present, plain backoff otherwise.
    RateLimited { retry_after: Option<Duration> },
    /// 401/403 whose body signals an expired or unauthorized token.
    AuthExpired { status: u16 },
    /// Any other non-2xx status.
    Upstream { status: u16 },
    /// Network or transport exception.
    Transport { message: String },
}

/// Body markers indicating the access token was rejected rather than the
/// request itself.
const AUTH_EXPIRY_MARKERS: [&str; 2] = ["expired", "Unauthorized"];

/// Maps one HTTP response onto the retry table. Returns `None` for 2xx.
pub fn classify_response(response: &HttpResponse) -> Option<FailureKind> {
    if response.is_success() {
        return None;
    }
    if response.status == 429 {
        return Some(FailureKind::RateLimited {
            retry_after: response.retry_after(),
        });
    }
    if matches!(response.status, 401 | 403)
        && AUTH_EXPIRY_MARKERS
            .iter()
            .any(|marker| response.body.contains(marker))
    {
        return Some(FailureKind::AuthExpired {
            status: response.status,
        });
    }
    Some(FailureKind::Upstream {
        status: response.status,
    })
}

pub fn classify_transport(error: &HttpError) -> FailureKind {
    FailureKind::Transport {
        message: error.message().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(2),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_secs(2));
        assert_eq!(backoff.delay(1), Duration::from_secs(4));
        assert_eq!(backoff.delay(2), Duration::from_secs(8));
        assert_eq!(backoff.delay(3), Duration::from_secs(10));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(7), Duration::from_millis(500));
    }

    #[test]
    fn jittered_delay_stays_within_half_band() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..20 {
            let delay_ms = backoff.delay(1).as_millis() as f64;
            assert!((99.0..=301.0).contains(&delay_ms), "delay_ms={delay_ms}");
        }
    }

    #[test]
    fn rate_limit_classification_carries_retry_after() {
        let response = HttpResponse::new(429, "slow down").with_header("retry-after", "5");
        assert_eq!(
            classify_response(&response),
            Some(FailureKind::RateLimited {
                retry_after: Some(Duration::from_secs(5))
            })
        );
    }

    #[test]
    fn expired_token_body_classifies_as_auth_failure() {
        let response = HttpResponse::new(403, r#"{"errors":[{"message":"The security token included in the request is expired"}]}"#);
        assert_eq!(
            classify_response(&response),
            Some(FailureKind::AuthExpired { status: 403 })
        );
    }

    #[test]
    fn bare_forbidden_is_an_ordinary_upstream_failure() {
        let response = HttpResponse::new(403, r#"{"errors":[{"message":"Access to requested resource is denied"}]}"#);
        assert_eq!(
            classify_response(&response),
            Some(FailureKind::Upstream { status: 403 })
        );
    }

    #[test]
    fn success_is_not_classified() {
        assert_eq!(classify_response(&HttpResponse::ok_json("{}")), None);
    }
}
