use std::sync::Arc;

use serde_json::{json, Value};

use crate::batch::{BatchOrchestrator, BatchRun};
use crate::config::{in_serverless_runtime, SpApiSecrets};
use crate::credentials::CredentialLifecycle;
use crate::executor::RequestExecutor;
use crate::http_client::{encode_query, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{AccessError, Asin, CatalogItem, PricingSummary, ProductCode};

const ENDPOINT_BASE: &str = "https://sellingpartnerapi-fe.amazon.com";
const TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";
const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

const CATALOG_INCLUDED_DATA: &str =
    "attributes,dimensions,identifiers,images,productTypes,relationships,salesRanks,summaries";

/// Amazon's own seller id on the JP marketplace.
const AMAZON_SELLER_ID: &str = "AN1VRQENFRJN5";

/// Amazon Selling Partner API client: catalog lookups by JAN/ASIN and
/// batched competitive-pricing summaries.
///
/// Authenticates with short-lived LWA access tokens minted from the
/// long-lived refresh token; the executor re-stamps the token header on
/// every attempt so a mid-call refresh takes effect immediately.
#[derive(Clone)]
pub struct SpApiAdapter {
    executor: RequestExecutor,
    marketplace_id: String,
    policy: ProviderPolicy,
}

impl SpApiAdapter {
    pub fn new(
        secrets: &SpApiSecrets,
        marketplace_id: impl Into<String>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self::with_policy(secrets, marketplace_id, http, &ProviderPolicy::sp_api_default())
    }

    pub fn with_policy(
        secrets: &SpApiSecrets,
        marketplace_id: impl Into<String>,
        http: Arc<dyn HttpClient>,
        policy: &ProviderPolicy,
    ) -> Self {
        let credentials = Arc::new(CredentialLifecycle::new(
            http.clone(),
            TOKEN_URL,
            secrets.refresh.clone(),
            ACCESS_TOKEN_HEADER,
        ));
        Self {
            executor: RequestExecutor::from_policy(policy, http).with_credentials(credentials),
            marketplace_id: marketplace_id.into(),
            policy: *policy,
        }
    }

    /// Looks up catalog attributes for one product code. A response with
    /// no matching items is `Ok(None)`, not an error.
    pub async fn catalog_item(
        &self,
        code: &ProductCode,
    ) -> Result<Option<CatalogItem>, AccessError> {
        let query = encode_query(&[
            ("marketplaceIds", self.marketplace_id.as_str()),
            ("identifiers", code.as_str()),
            ("identifiersType", code.identifier_type()),
            ("includedData", CATALOG_INCLUDED_DATA),
        ]);
        let url = format!("{ENDPOINT_BASE}/catalog/2022-04-01/items?{query}");

        let response: Value = self
            .executor
            .execute_json(HttpRequest::get(url).with_header("accept", "application/json"))
            .await?;

        let Some(item) = response
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
        else {
            tracing::debug!(code = %code, "catalog lookup found no items");
            return Ok(None);
        };

        Ok(Some(parse_catalog_item(item, &self.marketplace_id)))
    }

    /// Catalog lookups for a list of codes with per-item outcomes. The
    /// catalog endpoint takes one identifier per call, so chunks are
    /// single items paced by the rate gate.
    pub async fn catalog_items(&self, codes: &[ProductCode]) -> BatchRun<CatalogItem> {
        let orchestrator = BatchOrchestrator::new(1);
        let adapter = self.clone();
        orchestrator
            .process_all(codes, move |chunk| {
                let adapter = adapter.clone();
                async move {
                    let mut results = Vec::with_capacity(chunk.len());
                    for code in &chunk {
                        results.push(adapter.catalog_item(code).await?);
                    }
                    Ok(results)
                }
            })
            .await
    }

    /// Batched competitive-pricing summaries, at most 20 ASINs per
    /// outbound request, honoring the provider's inter-batch cooldown
    /// except in serverless runtimes.
    pub async fn pricing_batch(&self, asins: &[Asin]) -> BatchRun<PricingSummary> {
        let cooldown = if in_serverless_runtime() {
            None
        } else {
            self.policy.batch.cooldown
        };
        let orchestrator =
            BatchOrchestrator::new(self.policy.batch.max_batch_size).with_cooldown(cooldown);

        let adapter = self.clone();
        orchestrator
            .process_all(asins, move |chunk| {
                let adapter = adapter.clone();
                async move { adapter.fetch_pricing_chunk(chunk).await }
            })
            .await
    }

    /// One batch call against the competitiveSummary endpoint. Response
    /// elements are mapped back to the request by array position; an
    /// element with a non-200 status or missing body yields `None`.
    async fn fetch_pricing_chunk(
        &self,
        chunk: Vec<Asin>,
    ) -> Result<Vec<Option<PricingSummary>>, AccessError> {
        let requests: Vec<Value> = chunk
            .iter()
            .map(|asin| {
                json!({
                    "asin": asin.as_str(),
                    "marketplaceId": self.marketplace_id,
                    "includedData": [
                        "featuredBuyingOptions",
                        "referencePrices",
                        "lowestPricedOffers"
                    ],
                    "lowestPricedOffersInputs": [{
                        "itemCondition": "New",
                        "offerType": "Consumer"
                    }],
                    "uri": "/products/pricing/2022-05-01/items/competitiveSummary",
                    "method": "GET"
                })
            })
            .collect();

        let url = format!(
            "{ENDPOINT_BASE}/batches/products/pricing/2022-05-01/items/competitiveSummary"
        );
        let request = HttpRequest::post(url)
            .with_header("accept", "application/json")
            .with_json_body(json!({ "requests": requests }).to_string());

        let response: Value = self.executor.execute_json(request).await?;
        let responses = response
            .get("responses")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        Ok(chunk
            .iter()
            .enumerate()
            .map(|(index, asin)| {
                let element = responses.get(index)?;
                if element_status(element).is_some_and(|status| status != 200) {
                    return None;
                }
                let body = element.get("body")?;
                Some(parse_pricing_summary(asin, body))
            })
            .collect())
    }
}

fn element_status(element: &Value) -> Option<i64> {
    element
        .get("status")
        .and_then(|status| status.get("statusCode"))
        .or_else(|| element.get("statusCode"))
        .and_then(Value::as_i64)
}

fn money_amount(node: Option<&Value>) -> Option<i64> {
    node?
        .get("amount")
        .and_then(Value::as_f64)
        .map(|amount| amount.round() as i64)
}

fn marketplace_attribute_value<'a>(
    attributes: Option<&'a Value>,
    name: &str,
    marketplace_id: &str,
) -> Option<&'a Value> {
    attributes?
        .get(name)
        .and_then(Value::as_array)?
        .iter()
        .find(|attr| {
            attr.get("marketplace_id").and_then(Value::as_str) == Some(marketplace_id)
        })
        .and_then(|attr| attr.get("value"))
}

fn measured_value(node: Option<&Value>, conversions: &[(&str, f64)]) -> Option<f64> {
    let node = node?;
    let value = node.get("value").and_then(Value::as_f64)?;
    let unit = node.get("unit").and_then(Value::as_str)?.to_ascii_lowercase();
    let factor = conversions
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
        .unwrap_or(1.0);
    Some(value * factor)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const LENGTH_CONVERSIONS: [(&str, f64); 2] = [("inches", 2.54), ("inch", 2.54)];
const WEIGHT_CONVERSIONS: [(&str, f64); 6] = [
    ("pounds", 453.592),
    ("pound", 453.592),
    ("lb", 453.592),
    ("lbs", 453.592),
    ("kilograms", 1000.0),
    ("kg", 1000.0),
];

/// Package dimensions and weight for the matching marketplace, preferring
/// package-level measurements over item-level ones.
fn parse_dimensions(item: &Value, marketplace_id: &str) -> (Vec<f64>, Option<f64>) {
    let mut dims: Vec<f64> = Vec::new();
    let mut weight = None;

    let entries = item
        .get("dimensions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for entry in entries {
        if entry.get("marketplaceId").and_then(Value::as_str) != Some(marketplace_id) {
            continue;
        }
        for container_key in ["package", "item"] {
            let Some(container) = entry.get(container_key) else {
                continue;
            };
            for dim_key in ["height", "length", "width"] {
                if let Some(value) =
                    measured_value(container.get(dim_key), &LENGTH_CONVERSIONS)
                {
                    dims.push(round2(value));
                }
            }
            if let Some(value) = measured_value(container.get("weight"), &WEIGHT_CONVERSIONS) {
                weight = Some(round2(value));
            }
            if !dims.is_empty() || weight.is_some() {
                break;
            }
        }
        if !dims.is_empty() || weight.is_some() {
            break;
        }
    }

    dims.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    (dims, weight)
}

fn parse_sales_rank(item: &Value) -> Option<u64> {
    for category in item.get("salesRanks").and_then(Value::as_array)? {
        if let Some(ranks) = category.get("displayGroupRanks").and_then(Value::as_array) {
            for rank_info in ranks {
                if let Some(rank) = rank_info.get("rank").and_then(Value::as_u64) {
                    return Some(rank);
                }
            }
        }
    }
    None
}

fn parse_identifier(item: &Value, marketplace_id: &str, identifier_type: &str) -> Option<String> {
    for identifier_set in item.get("identifiers").and_then(Value::as_array)? {
        if identifier_set.get("marketplaceId").and_then(Value::as_str) != Some(marketplace_id) {
            continue;
        }
        for id_entry in identifier_set
            .get("identifiers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
        {
            if id_entry.get("identifierType").and_then(Value::as_str) == Some(identifier_type) {
                return id_entry
                    .get("identifier")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
            }
        }
    }
    None
}

fn parse_catalog_item(item: &Value, marketplace_id: &str) -> CatalogItem {
    let attributes = item.get("attributes");
    let summary = item
        .get("summaries")
        .and_then(Value::as_array)
        .and_then(|summaries| summaries.first());

    let (package_dimensions_cm, package_weight_g) = parse_dimensions(item, marketplace_id);

    let asin = item
        .get("asin")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| parse_identifier(item, marketplace_id, "ASIN"));

    CatalogItem {
        asin,
        jan: parse_identifier(item, marketplace_id, "EAN"),
        title: summary
            .and_then(|s| s.get("itemName"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        brand: marketplace_attribute_value(attributes, "brand", marketplace_id)
            .and_then(Value::as_str)
            .map(str::to_owned),
        manufacturer: marketplace_attribute_value(attributes, "manufacturer", marketplace_id)
            .and_then(Value::as_str)
            .map(str::to_owned),
        list_price: marketplace_attribute_value(attributes, "list_price", marketplace_id)
            .and_then(Value::as_f64),
        package_dimensions_cm,
        package_weight_g,
        sales_rank: parse_sales_rank(item),
        image_url: summary
            .and_then(|s| s.get("mainImage"))
            .and_then(|image| image.get("link"))
            .and_then(Value::as_str)
            .map(str::to_owned),
    }
}

fn parse_pricing_summary(asin: &Asin, body: &Value) -> PricingSummary {
    let mut summary = PricingSummary::empty(asin.as_str());

    if let Some(options) = body.get("featuredBuyingOptions").and_then(Value::as_array) {
        for option in options {
            if option.get("buyingOptionType").and_then(Value::as_str) != Some("New") {
                continue;
            }
            let Some(offer) = option
                .get("segmentedFeaturedOffers")
                .and_then(Value::as_array)
                .and_then(|offers| offers.first())
            else {
                continue;
            };

            summary.featured_seller_id = offer
                .get("sellerId")
                .and_then(Value::as_str)
                .map(str::to_owned);
            summary.featured_price = money_amount(offer.get("listingPrice"));
            summary.featured_shipping = offer
                .get("shippingOptions")
                .and_then(Value::as_array)
                .and_then(|options| {
                    options.iter().find(|option| {
                        option.get("shippingOptionType").and_then(Value::as_str)
                            == Some("DEFAULT")
                    })
                })
                .and_then(|option| money_amount(option.get("price")))
                .filter(|amount| *amount != 0);
            summary.featured_points = offer
                .get("points")
                .and_then(|points| points.get("pointsNumber"))
                .and_then(Value::as_i64)
                .filter(|points| *points != 0)
                .map(|points| -points);
            break;
        }
    }

    if let Some(groups) = body.get("lowestPricedOffers").and_then(Value::as_array) {
        for group in groups {
            let condition = group
                .get("lowestPricedOffersInput")
                .and_then(|input| input.get("itemCondition"))
                .and_then(Value::as_str);
            if condition != Some("New") {
                continue;
            }

            for offer in group
                .get("offers")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[])
            {
                let seller_id = offer.get("sellerId").and_then(Value::as_str).unwrap_or("");
                if seller_id == AMAZON_SELLER_ID {
                    summary.amazon_offer_present = true;
                }

                let Some(price) = money_amount(offer.get("listingPrice")) else {
                    continue;
                };
                let is_fba = offer.get("fulfillmentType").and_then(Value::as_str) == Some("AFN");

                if is_fba {
                    summary.fba_offer_count += 1;
                    summary.lowest_fba_price = Some(match summary.lowest_fba_price {
                        Some(current) => current.min(price),
                        None => price,
                    });
                } else {
                    summary.merchant_offer_count += 1;
                    summary.lowest_merchant_price = Some(match summary.lowest_merchant_price {
                        Some(current) => current.min(price),
                        None => price,
                    });
                }
            }
        }
    }

    summary.total_new_offer_count = summary.fba_offer_count + summary.merchant_offer_count;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ItemOutcome;
    use crate::credentials::RefreshSecrets;
    use crate::http_client::{HttpError, HttpResponse};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    const MARKETPLACE: &str = "A1VC38T7YXB528";

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

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().expect("not poisoned").clone()
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

    fn secrets() -> SpApiSecrets {
        SpApiSecrets {
            refresh: RefreshSecrets {
                client_id: String::from("client"),
                client_secret: String::from("secret"),
                refresh_token: String::from("refresh"),
            },
        }
    }

    fn token_grant() -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse::ok_json(
            r#"{"access_token":"lwa-token","expires_in":3600}"#,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_item_parses_attributes_dimensions_and_rank() {
        let body = json!({
            "items": [{
                "asin": "B012345675",
                "attributes": {
                    "list_price": [{"marketplace_id": MARKETPLACE, "value": 2980.0}],
                    "brand": [{"marketplace_id": MARKETPLACE, "value": "Acme"}],
                    "manufacturer": [{"marketplace_id": MARKETPLACE, "value": "Acme Industries"}]
                },
                "dimensions": [{
                    "marketplaceId": MARKETPLACE,
                    "package": {
                        "height": {"value": 2.0, "unit": "inches"},
                        "length": {"value": 10.0, "unit": "centimeters"},
                        "width": {"value": 4.0, "unit": "centimeters"},
                        "weight": {"value": 1.0, "unit": "pounds"}
                    }
                }],
                "identifiers": [{
                    "marketplaceId": MARKETPLACE,
                    "identifiers": [{"identifierType": "EAN", "identifier": "4901234567890"}]
                }],
                "salesRanks": [{
                    "displayGroupRanks": [{"rank": 1234}]
                }],
                "summaries": [{
                    "itemName": "Acme Widget",
                    "mainImage": {"link": "https://images.example.test/widget.jpg"}
                }]
            }]
        })
        .to_string();

        let http = ScriptedHttpClient::new(vec![token_grant(), Ok(HttpResponse::ok_json(body))]);
        let adapter = SpApiAdapter::new(&secrets(), MARKETPLACE, http.clone());
        let code = ProductCode::classify("4901234567890").expect("valid code");

        let item = adapter
            .catalog_item(&code)
            .await
            .expect("lookup should succeed")
            .expect("item should be present");

        assert_eq!(item.asin.as_deref(), Some("B012345675"));
        assert_eq!(item.jan.as_deref(), Some("4901234567890"));
        assert_eq!(item.title.as_deref(), Some("Acme Widget"));
        assert_eq!(item.brand.as_deref(), Some("Acme"));
        assert_eq!(item.list_price, Some(2980.0));
        // 2 inches -> 5.08cm; sorted longest edge first.
        assert_eq!(item.package_dimensions_cm, vec![10.0, 5.08, 4.0]);
        assert_eq!(item.package_weight_g, Some(453.59));
        assert_eq!(item.sales_rank, Some(1234));

        // The API request (second recorded) carries the LWA token header.
        let requests = http.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].headers.get(ACCESS_TOKEN_HEADER).map(String::as_str),
            Some("lwa-token")
        );
        assert!(requests[1].url.contains("identifiersType=EAN"));
    }

    #[tokio::test(start_paused = true)]
    async fn catalog_lookup_with_no_items_is_none() {
        let http = ScriptedHttpClient::new(vec![
            token_grant(),
            Ok(HttpResponse::ok_json(r#"{"items":[]}"#)),
        ]);
        let adapter = SpApiAdapter::new(&secrets(), MARKETPLACE, http);
        let code = ProductCode::classify("B012345675").expect("valid code");

        let item = adapter.catalog_item(&code).await.expect("lookup succeeds");
        assert!(item.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pricing_chunk_maps_responses_by_position() {
        let pricing_body = json!({
            "responses": [
                {
                    "status": {"statusCode": 200},
                    "body": {
                        "featuredBuyingOptions": [{
                            "buyingOptionType": "New",
                            "segmentedFeaturedOffers": [{
                                "sellerId": "SELLER1",
                                "listingPrice": {"amount": 2480.0},
                                "shippingOptions": [{
                                    "shippingOptionType": "DEFAULT",
                                    "price": {"amount": 350.0}
                                }],
                                "points": {"pointsNumber": 25}
                            }]
                        }],
                        "lowestPricedOffers": [{
                            "lowestPricedOffersInput": {"itemCondition": "New"},
                            "offers": [
                                {"sellerId": "SELLER1", "fulfillmentType": "AFN",
                                 "listingPrice": {"amount": 2480.0}},
                                {"sellerId": "SELLER2", "fulfillmentType": "MFN",
                                 "listingPrice": {"amount": 2280.0}},
                                {"sellerId": "AN1VRQENFRJN5", "fulfillmentType": "AFN",
                                 "listingPrice": {"amount": 2680.0}}
                            ]
                        }]
                    }
                },
                {"status": {"statusCode": 404}, "body": {}}
            ]
        })
        .to_string();

        let http = ScriptedHttpClient::new(vec![
            token_grant(),
            Ok(HttpResponse::ok_json(pricing_body)),
        ]);
        let adapter = SpApiAdapter::new(&secrets(), MARKETPLACE, http.clone());
        let asins = vec![
            Asin::parse("B012345675").expect("valid"),
            Asin::parse("B012345676").expect("valid"),
        ];

        let run = adapter.pricing_batch(&asins).await;

        assert_eq!(run.outcomes.len(), 2);
        match &run.outcomes[0] {
            ItemOutcome::Enriched(summary) => {
                assert_eq!(summary.asin, "B012345675");
                assert_eq!(summary.featured_price, Some(2480));
                assert_eq!(summary.featured_shipping, Some(350));
                assert_eq!(summary.featured_points, Some(-25));
                assert_eq!(summary.featured_seller_id.as_deref(), Some("SELLER1"));
                assert_eq!(summary.lowest_fba_price, Some(2480));
                assert_eq!(summary.lowest_merchant_price, Some(2280));
                assert!(summary.amazon_offer_present);
                assert_eq!(summary.fba_offer_count, 2);
                assert_eq!(summary.merchant_offer_count, 1);
                assert_eq!(summary.total_new_offer_count, 3);
            }
            other => panic!("expected enriched outcome, got {other:?}"),
        }
        assert!(matches!(run.outcomes[1], ItemOutcome::NoData));

        // The batch request body lists both ASINs in order.
        let requests = http.recorded_requests();
        let batch_request = &requests[1];
        let payload: Value =
            serde_json::from_str(batch_request.body.as_deref().expect("body present"))
                .expect("valid JSON body");
        let sent = payload
            .get("requests")
            .and_then(Value::as_array)
            .expect("requests array");
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0].get("asin").and_then(Value::as_str),
            Some("B012345675")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_shipping_and_zero_points_collapse_to_none() {
        let body = json!({
            "featuredBuyingOptions": [{
                "buyingOptionType": "New",
                "segmentedFeaturedOffers": [{
                    "sellerId": "SELLER1",
                    "listingPrice": {"amount": 1980.0},
                    "shippingOptions": [{
                        "shippingOptionType": "DEFAULT",
                        "price": {"amount": 0.0}
                    }],
                    "points": {"pointsNumber": 0}
                }]
            }]
        });

        let asin = Asin::parse("B012345675").expect("valid");
        let summary = parse_pricing_summary(&asin, &body);

        assert_eq!(summary.featured_price, Some(1980));
        assert_eq!(summary.featured_shipping, None);
        assert_eq!(summary.featured_points, None);
    }
}
