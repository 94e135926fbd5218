use std::sync::Arc;

use serde_json::{json, Value};

use sedori_core::{
    HttpClient, JanCode, ProviderId, ProviderSecrets, RakutenIchibaAdapter, ReqwestHttpClient,
    YahooShoppingAdapter,
};

use crate::cli::ListingsArgs;
use crate::error::CliError;

use super::CommandResult;

/// Searches Yahoo and Rakuten for every JAN, merging both result sets per
/// code. A provider failure for one JAN becomes a warning and an empty
/// hit list, never a run failure.
pub async fn run(args: &ListingsArgs) -> Result<CommandResult, CliError> {
    let secrets = ProviderSecrets::from_env();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    let yahoo = YahooShoppingAdapter::new(secrets.require_yahoo()?, http.clone());
    let rakuten = RakutenIchibaAdapter::new(secrets.require_rakuten()?, http);

    let mut warnings = Vec::new();
    let mut rows: Vec<Value> = Vec::with_capacity(args.jans.len());

    for raw in &args.jans {
        let jan = JanCode::parse(raw)?;
        let mut hits = Vec::new();

        match yahoo.search_by_jan(&jan, args.max_hits).await {
            Ok(found) => hits.extend(found),
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => warnings.push(format!("yahoo search failed for {jan}: {error}")),
        }

        match rakuten.search_by_jan(&jan, args.max_hits).await {
            Ok(found) => hits.extend(found),
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => warnings.push(format!("rakuten search failed for {jan}: {error}")),
        }

        rows.push(json!({
            "jan": jan.as_str(),
            "hit_count": hits.len(),
            "hits": hits,
        }));
    }

    let data = json!({ "listings": rows });
    Ok(
        CommandResult::ok(data, vec![ProviderId::Yahoo, ProviderId::Rakuten])
            .with_warnings(warnings),
    )
}
