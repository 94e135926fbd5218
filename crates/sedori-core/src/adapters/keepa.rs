use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::batch::{BatchOrchestrator, BatchRun};
use crate::executor::RequestExecutor;
use crate::http_client::{encode_query, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::quota::{QuotaSnapshot, TokenBudgetGuard};
use crate::{AccessError, Asin, ProductSnapshot};

const PRODUCT_URL: &str = "https://api.keepa.com/product";
const TOKEN_STATUS_URL: &str = "https://api.keepa.com/token";

/// Amazon Japan marketplace in Keepa's domain numbering.
const DOMAIN_JP: u8 = 5;
const STATS_DAYS: u32 = 180;

/// Keepa product-history client with token-budget metering.
///
/// Every product response reports the account's remaining token budget;
/// the guard is overwritten from that report after each call, and checked
/// before each batch so the client never spends calls it cannot afford.
#[derive(Clone)]
pub struct KeepaAdapter {
    executor: RequestExecutor,
    api_key: String,
    guard: Arc<TokenBudgetGuard>,
    policy: ProviderPolicy,
}

impl KeepaAdapter {
    pub fn new(api_key: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(api_key, http, &ProviderPolicy::keepa_default())
    }

    pub fn with_policy(
        api_key: impl Into<String>,
        http: Arc<dyn HttpClient>,
        policy: &ProviderPolicy,
    ) -> Self {
        let cost_per_item = policy.quota.map(|quota| quota.cost_per_item).unwrap_or(1);
        Self {
            executor: RequestExecutor::from_policy(policy, http),
            api_key: api_key.into(),
            guard: Arc::new(TokenBudgetGuard::new(0, cost_per_item)),
            policy: *policy,
        }
    }

    pub fn quota(&self) -> QuotaSnapshot {
        self.guard.snapshot()
    }

    /// Probes the token-status endpoint and seeds the budget guard. The
    /// probe itself does not consume tokens.
    pub async fn refresh_quota(&self) -> Result<QuotaSnapshot, AccessError> {
        let query = encode_query(&[("key", self.api_key.as_str())]);
        let status: TokenStatusResponse = self
            .executor
            .execute_json(HttpRequest::get(format!("{TOKEN_STATUS_URL}?{query}")))
            .await?;

        self.guard.record_reported(status.tokens_left);
        Ok(self.guard.snapshot())
    }

    /// Fetches product snapshots for the given ASINs in budget-guarded
    /// batches. Output has one outcome per input ASIN, in input order.
    pub async fn products_batch(
        &self,
        asins: &[Asin],
    ) -> Result<BatchRun<ProductSnapshot>, AccessError> {
        if self.guard.snapshot().tokens_left <= 0 {
            self.refresh_quota().await?;
        }

        let orchestrator = BatchOrchestrator::new(self.policy.batch.max_batch_size)
            .with_cooldown(self.policy.batch.cooldown)
            .with_budget_guard(self.guard.clone());

        let adapter = self.clone();
        let run = orchestrator
            .process_all(asins, move |chunk| {
                let adapter = adapter.clone();
                async move { adapter.fetch_chunk(chunk).await }
            })
            .await;

        Ok(run)
    }

    /// One product call for up to `max_batch_size` ASINs. Results are
    /// aligned back to the request order by ASIN, since the response may
    /// omit or reorder products.
    async fn fetch_chunk(
        &self,
        asins: Vec<Asin>,
    ) -> Result<Vec<Option<ProductSnapshot>>, AccessError> {
        let asin_csv = asins
            .iter()
            .map(Asin::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let stats = STATS_DAYS.to_string();
        let domain = DOMAIN_JP.to_string();
        let query = encode_query(&[
            ("key", self.api_key.as_str()),
            ("domain", domain.as_str()),
            ("asin", asin_csv.as_str()),
            ("stats", stats.as_str()),
            ("days", stats.as_str()),
            ("update", "1"),
        ]);

        let response: ProductResponse = self
            .executor
            .execute_json(HttpRequest::get(format!("{PRODUCT_URL}?{query}")))
            .await?;

        if let Some(tokens_left) = response.tokens_left {
            self.guard.record_reported(tokens_left);
        }

        let mut by_asin: HashMap<String, ProductSnapshot> = response
            .products
            .into_iter()
            .map(|product| (product.asin.clone(), product.into_snapshot()))
            .collect();

        Ok(asins
            .iter()
            .map(|asin| by_asin.remove(asin.as_str()))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TokenStatusResponse {
    #[serde(rename = "tokensLeft")]
    tokens_left: i64,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    #[serde(default, rename = "tokensLeft")]
    tokens_left: Option<i64>,
    #[serde(default)]
    products: Vec<KeepaProduct>,
}

#[derive(Debug, Deserialize)]
struct KeepaProduct {
    asin: String,
    #[serde(default, rename = "eanList")]
    ean_list: Vec<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    stats: Option<KeepaStats>,
}

/// Price arrays index by Keepa series: 0 = Amazon, 1 = marketplace new.
/// A value of -1 means "no data".
#[derive(Debug, Deserialize)]
struct KeepaStats {
    #[serde(default)]
    current: Vec<i64>,
    #[serde(default, rename = "avg90")]
    avg90: Vec<i64>,
    #[serde(default, rename = "salesRankDrops30")]
    sales_rank_drops_30: Option<i64>,
    #[serde(default, rename = "salesRankDrops90")]
    sales_rank_drops_90: Option<i64>,
    #[serde(default, rename = "totalOfferCount")]
    total_offer_count: Option<i64>,
}

const SERIES_AMAZON: usize = 0;
const SERIES_NEW: usize = 1;

fn series_price(values: &[i64], series: usize) -> Option<i64> {
    values.get(series).copied().filter(|value| *value >= 0)
}

impl KeepaProduct {
    fn into_snapshot(self) -> ProductSnapshot {
        let stats = self.stats;
        let (current_amazon, current_new, avg90_new, drops_30, drops_90, offers) = match &stats {
            Some(stats) => (
                series_price(&stats.current, SERIES_AMAZON),
                series_price(&stats.current, SERIES_NEW),
                series_price(&stats.avg90, SERIES_NEW),
                stats.sales_rank_drops_30,
                stats.sales_rank_drops_90,
                stats.total_offer_count,
            ),
            None => (None, None, None, None, None, None),
        };

        ProductSnapshot {
            asin: self.asin,
            ean: self.ean_list.into_iter().next(),
            title: self.title,
            brand: self.brand,
            current_amazon_price: current_amazon,
            current_new_price: current_new,
            avg90_new_price: avg90_new,
            sales_drops_30: drops_30,
            sales_drops_90: drops_90,
            total_offer_count: offers,
        }
    }
}
