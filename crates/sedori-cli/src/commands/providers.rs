use serde_json::{json, Value};

use sedori_core::{ProviderId, ProviderPolicy};

use crate::error::CliError;

use super::CommandResult;

pub fn run() -> Result<CommandResult, CliError> {
    let rows: Vec<Value> = ProviderId::ALL
        .iter()
        .map(|provider| {
            let policy = ProviderPolicy::default_for(*provider);
            json!({
                "provider": provider.as_str(),
                "requests_per_second": policy.requests_per_second,
                "min_interval_ms": policy.min_interval().as_millis() as u64,
                "max_attempts": policy.retry.max_attempts,
                "max_batch_size": policy.batch.max_batch_size,
                "cooldown_secs": policy.batch.cooldown.map(|cooldown| cooldown.as_secs()),
                "quota_cost_per_item": policy.quota.map(|quota| quota.cost_per_item),
            })
        })
        .collect();

    Ok(CommandResult::ok(
        json!({ "providers": rows }),
        ProviderId::ALL.to_vec(),
    ))
}
