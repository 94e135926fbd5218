use std::env;

use crate::credentials::RefreshSecrets;
use crate::AccessError;

/// Environment variable names, matching the deployed configuration.
const YAHOO_CLIENT_ID: &str = "YAHOO_CLIENT_ID";
const RAKUTEN_APPLICATION_ID: &str = "RAKUTEN_APPLICATION_ID";
const KEEPA_API_KEY: &str = "KEEPA_API_KEY";
const SPAPI_REFRESH_TOKEN: &str = "SPAPI_REFRESH_TOKEN";
const SPAPI_LWA_APP_ID: &str = "SPAPI_LWA_APP_ID";
const SPAPI_LWA_CLIENT_SECRET: &str = "SPAPI_LWA_CLIENT_SECRET";
const SPAPI_MARKETPLACE_IDS: &str = "SPAPI_MARKETPLACE_IDS";
const SPAPI_RPS: &str = "SPAPI_RPS";
const SERVERLESS_PROBE: &str = "AWS_LAMBDA_FUNCTION_NAME";

const DEFAULT_MARKETPLACE_ID: &str = "A1VC38T7YXB528";

/// Secrets and per-deployment settings, read from the environment. The
/// values are opaque to the access layer; a missing required secret is a
/// configuration error, not something to retry.
#[derive(Debug, Clone)]
pub struct ProviderSecrets {
    pub yahoo_client_id: Option<String>,
    pub rakuten_application_id: Option<String>,
    pub keepa_api_key: Option<String>,
    pub sp_api: Option<SpApiSecrets>,
    pub marketplace_id: String,
}

#[derive(Debug, Clone)]
pub struct SpApiSecrets {
    pub refresh: RefreshSecrets,
}

impl ProviderSecrets {
    pub fn from_env() -> Self {
        let sp_api = match (
            non_empty(SPAPI_LWA_APP_ID),
            non_empty(SPAPI_LWA_CLIENT_SECRET),
            non_empty(SPAPI_REFRESH_TOKEN),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(SpApiSecrets {
                refresh: RefreshSecrets {
                    client_id,
                    client_secret,
                    refresh_token,
                },
            }),
            _ => None,
        };

        Self {
            yahoo_client_id: non_empty(YAHOO_CLIENT_ID),
            rakuten_application_id: non_empty(RAKUTEN_APPLICATION_ID),
            keepa_api_key: non_empty(KEEPA_API_KEY),
            sp_api,
            marketplace_id: non_empty(SPAPI_MARKETPLACE_IDS)
                .and_then(|ids| ids.split(',').next().map(str::to_owned))
                .unwrap_or_else(|| String::from(DEFAULT_MARKETPLACE_ID)),
        }
    }

    pub fn require_yahoo(&self) -> Result<&str, AccessError> {
        self.yahoo_client_id
            .as_deref()
            .ok_or_else(|| missing(YAHOO_CLIENT_ID))
    }

    pub fn require_rakuten(&self) -> Result<&str, AccessError> {
        self.rakuten_application_id
            .as_deref()
            .ok_or_else(|| missing(RAKUTEN_APPLICATION_ID))
    }

    pub fn require_keepa(&self) -> Result<&str, AccessError> {
        self.keepa_api_key
            .as_deref()
            .ok_or_else(|| missing(KEEPA_API_KEY))
    }

    pub fn require_sp_api(&self) -> Result<&SpApiSecrets, AccessError> {
        self.sp_api.as_ref().ok_or_else(|| {
            AccessError::Configuration(format!(
                "missing SP-API credentials ({SPAPI_LWA_APP_ID}, {SPAPI_LWA_CLIENT_SECRET}, {SPAPI_REFRESH_TOKEN})"
            ))
        })
    }
}

/// Deployment override for the SP-API request rate (`SPAPI_RPS`).
/// Unset or unparseable values fall back to the policy default.
pub fn sp_api_requests_per_second() -> Option<f64> {
    non_empty(SPAPI_RPS)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|rate| *rate > 0.0)
}

fn missing(name: &str) -> AccessError {
    AccessError::Configuration(format!("missing required environment variable {name}"))
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Whether this process runs inside a short-lived serverless invocation,
/// where inter-batch cooldowns waste billed wall-clock for no benefit.
pub fn in_serverless_runtime() -> bool {
    env::var(SERVERLESS_PROBE).is_ok()
}
