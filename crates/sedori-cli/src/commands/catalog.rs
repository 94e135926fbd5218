use std::sync::Arc;

use sedori_core::{
    HttpClient, ProductCode, ProviderId, ProviderPolicy, ProviderSecrets, ReqwestHttpClient,
    SpApiAdapter,
};

use crate::cli::CatalogArgs;
use crate::error::CliError;

use super::{outcomes_to_json, run_disposition, CommandResult};

pub async fn run(args: &CatalogArgs) -> Result<CommandResult, CliError> {
    let secrets = ProviderSecrets::from_env();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let mut policy = ProviderPolicy::sp_api_default();
    if let Some(rate) = sedori_core::sp_api_requests_per_second() {
        policy.requests_per_second = rate;
    }
    let adapter = SpApiAdapter::with_policy(
        secrets.require_sp_api()?,
        secrets.marketplace_id.clone(),
        http,
        &policy,
    );

    let codes = args
        .codes
        .iter()
        .map(|raw| ProductCode::classify(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let run = adapter.catalog_items(&codes).await;
    let (status, warnings, errors) = run_disposition(&run);

    let labels: Vec<String> = codes
        .iter()
        .map(|code| code.as_str().to_owned())
        .collect();

    Ok(CommandResult {
        data: outcomes_to_json(&labels, &run),
        provider_chain: vec![ProviderId::SpApi],
        warnings,
        errors,
        status,
    })
}
