use thiserror::Error;

use crate::ProviderId;

/// Validation errors for product identifiers and configuration input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("product code cannot be empty")]
    EmptyCode,
    #[error("JAN/EAN code must be 5 to 13 digits: '{value}'")]
    InvalidJanLength { value: String },
    #[error("ASIN must be 10 alphanumeric characters starting with 'B0': '{value}'")]
    InvalidAsin { value: String },
    #[error("'{value}' is neither a JAN/EAN code nor an ASIN")]
    UnclassifiableCode { value: String },

    #[error("invalid provider '{value}', expected one of yahoo, rakuten, sp-api, keepa")]
    InvalidProvider { value: String },
}

/// Access-layer error taxonomy.
///
/// Only the fatal variants abort an enrichment run; everything else is
/// either retried away inside the executor or recorded as a per-item
/// placeholder by the batch orchestrator.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("credential refresh rejected by token endpoint: {0}")]
    CredentialRefresh(String),

    #[error("token budget exhausted: {tokens_left} left, {required} required")]
    BudgetExhausted { tokens_left: i64, required: i64 },

    #[error("{provider} returned status {status} after {attempts} attempt(s)")]
    UpstreamStatus {
        provider: ProviderId,
        status: u16,
        attempts: u32,
    },

    #[error("{provider} transport failure after {attempts} attempt(s): {message}")]
    Transport {
        provider: ProviderId,
        attempts: u32,
        message: String,
    },

    #[error("{provider} response decode failed: {message}")]
    Decode {
        provider: ProviderId,
        message: String,
    },
}

impl AccessError {
    /// Whether this error aborts a whole run rather than a single item.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Configuration(_)
                | Self::CredentialRefresh(_)
                | Self::BudgetExhausted { .. }
        )
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "access.validation",
            Self::Configuration(_) => "access.configuration",
            Self::CredentialRefresh(_) => "access.credential_refresh",
            Self::BudgetExhausted { .. } => "access.budget_exhausted",
            Self::UpstreamStatus { .. } => "access.upstream_status",
            Self::Transport { .. } => "access.transport",
            Self::Decode { .. } => "access.decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_and_configuration_errors_are_fatal() {
        assert!(AccessError::BudgetExhausted {
            tokens_left: 3,
            required: 20
        }
        .is_fatal());
        assert!(AccessError::Configuration(String::from("missing key")).is_fatal());
        assert!(AccessError::CredentialRefresh(String::from("invalid_grant")).is_fatal());
    }

    #[test]
    fn upstream_failures_are_item_scoped() {
        let error = AccessError::UpstreamStatus {
            provider: ProviderId::SpApi,
            status: 500,
            attempts: 5,
        };
        assert!(!error.is_fatal());
        assert_eq!(error.code(), "access.upstream_status");
    }
}
