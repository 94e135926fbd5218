use std::sync::Arc;

use sedori_core::{
    Asin, HttpClient, KeepaAdapter, ProviderId, ProviderSecrets, ReqwestHttpClient,
};

use crate::cli::SnapshotArgs;
use crate::error::CliError;

use super::{outcomes_to_json, run_disposition, CommandResult};

pub async fn run(args: &SnapshotArgs) -> Result<CommandResult, CliError> {
    let secrets = ProviderSecrets::from_env();
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let adapter = KeepaAdapter::new(secrets.require_keepa()?, http);

    let asins = args
        .asins
        .iter()
        .map(|raw| Asin::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let run = adapter.products_batch(&asins).await?;
    let (status, mut warnings, errors) = run_disposition(&run);

    let quota = adapter.quota();
    warnings.push(format!("{} keepa tokens remaining", quota.tokens_left));

    let labels: Vec<String> = asins.iter().map(|asin| asin.as_str().to_owned()).collect();

    Ok(CommandResult {
        data: outcomes_to_json(&labels, &run),
        provider_chain: vec![ProviderId::Keepa],
        warnings,
        errors,
        status,
    })
}
