use std::sync::Arc;

use sedori_core::{
    Asin, HttpClient, ProviderId, ProviderPolicy, ProviderSecrets, ReqwestHttpClient,
    SpApiAdapter,
};

use crate::cli::PricingArgs;
use crate::error::CliError;

use super::{outcomes_to_json, run_disposition, CommandResult};

pub async fn run(args: &PricingArgs) -> Result<CommandResult, CliError> {
    let secrets = ProviderSecrets::from_env();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());

    let mut policy = ProviderPolicy::sp_api_default();
    if let Some(size) = args.batch_size {
        policy.batch.max_batch_size = size.clamp(1, policy.batch.max_batch_size);
    }
    if let Some(rate) = sedori_core::sp_api_requests_per_second() {
        policy.requests_per_second = rate;
    }

    let adapter = SpApiAdapter::with_policy(
        secrets.require_sp_api()?,
        secrets.marketplace_id.clone(),
        http,
        &policy,
    );

    let asins = args
        .asins
        .iter()
        .map(|raw| Asin::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let run = adapter.pricing_batch(&asins).await;
    let (status, warnings, errors) = run_disposition(&run);

    let labels: Vec<String> = asins.iter().map(|asin| asin.as_str().to_owned()).collect();

    Ok(CommandResult {
        data: outcomes_to_json(&labels, &run),
        provider_chain: vec![ProviderId::SpApi],
        warnings,
        errors,
        status,
    })
}
