use clap::{Args, Parser, Subcommand, ValueEnum};

/// Product enrichment across commerce APIs (Yahoo, Rakuten, SP-API, Keepa).
#[derive(Debug, Parser)]
#[command(name = "sedori", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search Yahoo and Rakuten listings by JAN code
    Listings(ListingsArgs),
    /// Look up SP-API catalog attributes for JAN/EAN or ASIN codes
    Catalog(CatalogArgs),
    /// Fetch batched SP-API competitive-pricing summaries for ASINs
    Pricing(PricingArgs),
    /// Fetch Keepa product snapshots for ASINs
    Snapshot(SnapshotArgs),
    /// Show per-provider access policies
    Providers,
}

#[derive(Debug, Args)]
pub struct ListingsArgs {
    /// JAN/EAN codes to search for
    #[arg(required = true)]
    pub jans: Vec<String>,

    /// Listings to fetch per JAN and provider
    #[arg(long, default_value_t = 3)]
    pub max_hits: usize,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// JAN/EAN or ASIN codes to look up
    #[arg(required = true)]
    pub codes: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PricingArgs {
    /// ASINs to price
    #[arg(required = true)]
    pub asins: Vec<String>,

    /// Items per outbound batch (capped at the provider limit of 20)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// ASINs to snapshot
    #[arg(required = true)]
    pub asins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}
