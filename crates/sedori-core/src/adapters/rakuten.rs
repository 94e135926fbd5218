use std::sync::Arc;

use serde::Deserialize;

use crate::executor::RequestExecutor;
use crate::http_client::{encode_query, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{AccessError, JanCode, ListingHit, ProviderId, ShippingCondition};

const ICHIBA_SEARCH_URL: &str =
    "https://app.rakuten.co.jp/services/api/IchibaItem/Search/20220601";

/// Rakuten Ichiba item-search client, keyed by JAN code.
#[derive(Clone)]
pub struct RakutenIchibaAdapter {
    executor: RequestExecutor,
    application_id: String,
}

impl RakutenIchibaAdapter {
    pub fn new(application_id: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(application_id, http, &ProviderPolicy::rakuten_default())
    }

    pub fn with_policy(
        application_id: impl Into<String>,
        http: Arc<dyn HttpClient>,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            executor: RequestExecutor::from_policy(policy, http),
            application_id: application_id.into(),
        }
    }

    /// Searches listings for one JAN code used as a keyword, cheapest
    /// first. `field=0` widens the match beyond exact item-code fields.
    pub async fn search_by_jan(
        &self,
        jan: &JanCode,
        max_hits: usize,
    ) -> Result<Vec<ListingHit>, AccessError> {
        let hits = max_hits.to_string();
        let query = encode_query(&[
            ("applicationId", self.application_id.as_str()),
            ("keyword", jan.as_str()),
            ("hits", hits.as_str()),
            ("sort", "+itemPrice"),
            ("format", "json"),
            ("formatVersion", "2"),
            ("field", "0"),
        ]);

        let response: IchibaSearchResponse = self
            .executor
            .execute_json(HttpRequest::get(format!("{ICHIBA_SEARCH_URL}?{query}")))
            .await?;

        let listings = response
            .items
            .into_iter()
            .map(|item| item.into_listing(jan))
            .collect::<Vec<_>>();

        tracing::debug!(jan = %jan, hits = listings.len(), "rakuten search completed");
        Ok(listings)
    }
}

#[derive(Debug, Deserialize)]
struct IchibaSearchResponse {
    #[serde(default, rename = "Items")]
    items: Vec<IchibaItem>,
}

#[derive(Debug, Deserialize)]
struct IchibaItem {
    #[serde(default, rename = "itemPrice")]
    item_price: Option<i64>,
    #[serde(default, rename = "itemUrl")]
    item_url: Option<String>,
    #[serde(default, rename = "postageFlag")]
    postage_flag: Option<i64>,
}

impl IchibaItem {
    fn into_listing(self, jan: &JanCode) -> ListingHit {
        // postageFlag defaults to 1 (shipping billed separately).
        let shipping = ShippingCondition::from_rakuten_flag(self.postage_flag.unwrap_or(1));

        ListingHit {
            jan: jan.as_str().to_owned(),
            provider: ProviderId::Rakuten,
            price: self.item_price.unwrap_or(0),
            shipping,
            url: self.item_url.unwrap_or_default(),
        }
    }
}
