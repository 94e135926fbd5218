use std::sync::Arc;

use serde::Deserialize;

use crate::executor::RequestExecutor;
use crate::http_client::{encode_query, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{AccessError, JanCode, ListingHit, ProviderId, ShippingCondition};

const ITEM_SEARCH_URL: &str =
    "https://shopping.yahooapis.jp/ShoppingWebService/V3/itemSearch";

/// Yahoo Shopping item-search client, keyed by JAN code.
#[derive(Clone)]
pub struct YahooShoppingAdapter {
    executor: RequestExecutor,
    app_id: String,
}

impl YahooShoppingAdapter {
    pub fn new(app_id: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(app_id, http, &ProviderPolicy::yahoo_default())
    }

    pub fn with_policy(
        app_id: impl Into<String>,
        http: Arc<dyn HttpClient>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            executor: RequestExecutor::from_policy(policy, http),
            app_id: app_id.into(),
        }
    }

    /// Searches in-stock new-condition listings for one JAN code, cheapest
    /// first. An empty hit list is a successful result, not an error.
    pub async fn search_by_jan(
        &self,
        jan: &JanCode,
        max_hits: usize,
    ) -> Result<Vec<ListingHit>, AccessError> {
        let results = max_hits.to_string();
        let query = encode_query(&[
            ("appid", self.app_id.as_str()),
            ("jan_code", jan.as_str()),
            ("in_stock", "true"),
            ("condition", "new"),
            ("sort", "+price"),
            ("results", results.as_str()),
        ]);

        let response: ItemSearchResponse = self
            .executor
            .execute_json(HttpRequest::get(format!("{ITEM_SEARCH_URL}?{query}")))
            .await?;

        let hits = response
            .hits
            .into_iter()
            .map(|hit| hit.into_listing(jan))
            .collect::<Vec<_>>();

        tracing::debug!(jan = %jan, hits = hits.len(), "yahoo search completed");
        Ok(hits)
    }
}

#[derive(Debug, Deserialize)]
struct ItemSearchResponse {
    #[serde(default)]
    hits: Vec<ItemHit>,
}

#[derive(Debug, Deserialize)]
struct ItemHit {
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    shipping: Option<ShippingInfo>,
}

#[derive(Debug, Deserialize)]
struct ShippingInfo {
    #[serde(default)]
    code: Option<i64>,
}

impl ItemHit {
    fn into_listing(self, jan: &JanCode) -> ListingHit {
        let shipping = self
            .shipping
            .and_then(|info| info.code)
            .map(ShippingCondition::from_yahoo_code)
            .unwrap_or(ShippingCondition::Extra);

        ListingHit {
            jan: jan.as_str().to_owned(),
            provider: ProviderId::Yahoo,
            price: self.price.unwrap_or(0),
            shipping,
            url: self.url.unwrap_or_default(),
        }
    }
}
