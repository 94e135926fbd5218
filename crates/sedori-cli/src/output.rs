use serde_json::Value;

use crate::cli::OutputFormat;
use crate::commands::RunReport;
use crate::error::CliError;

pub fn render(report: &RunReport, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(report)?,
    }

    Ok(())
}

fn render_table(report: &RunReport) -> Result<(), CliError> {
    println!("request  {}", report.request_id);
    println!(
        "status   {}",
        serde_json::to_value(report.status)?
            .as_str()
            .unwrap_or("unknown")
    );
    println!("latency  {}ms", report.latency_ms);

    if let Some(items) = report.data.get("items").and_then(Value::as_array) {
        println!();
        println!("{:<16} {:<12} detail", "code", "status");
        for item in items {
            let code = item.get("code").and_then(Value::as_str).unwrap_or("-");
            let status = item.get("status").and_then(Value::as_str).unwrap_or("-");
            let detail = item
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| {
                    item.get("data")
                        .map(|data| serde_json::to_string(data).unwrap_or_default())
                })
                .unwrap_or_default();
            println!("{code:<16} {status:<12} {detail}");
        }
    } else {
        println!();
        println!("{}", serde_json::to_string_pretty(&report.data)?);
    }

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &report.errors {
        eprintln!("error: {error}");
    }

    Ok(())
}
