//! Big-key analyzer: scans the keyspace, reports oversized keys and how to
//! fix them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use keyward::redis::RedisConnector;
use keyward::{Analyzer, Recommender, ResilientClient, export_json};
use keyward_cli::{ensure_complete, init_tracing, load_settings, report};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "keyward-bigkeys", version, about)]
struct Args {
    /// Cache host or redis:// URL.
    host: String,

    /// Port.
    #[arg(short, long, default_value_t = 6379)]
    port: u16,

    /// Password for AUTH.
    #[arg(long)]
    password: Option<String>,

    /// Key pattern to scan [default: *].
    #[arg(long)]
    pattern: Option<String>,

    /// Minimum size in MB for a key to be reported [default: 0.1].
    #[arg(long)]
    min_size: Option<f64>,

    /// Maximum number of keys to analyse [default: 1000].
    #[arg(long)]
    max_keys: Option<usize>,

    /// COUNT hint for each SCAN call [default: 100].
    #[arg(long)]
    batch_size: Option<usize>,

    /// Print per-key details and recommendations for the largest keys.
    #[arg(long)]
    detailed: bool,

    /// Write the big keys as JSON to this file.
    #[arg(long)]
    export: Option<PathBuf>,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    let analysis = &mut settings.analyzer;
    if let Some(pattern) = args.pattern {
        analysis.pattern = pattern;
    }
    if let Some(min_size) = args.min_size {
        analysis.min_size_mb = min_size;
    }
    if let Some(max_keys) = args.max_keys {
        analysis.max_keys = max_keys;
    }
    if let Some(batch_size) = args.batch_size {
        analysis.batch_size = batch_size;
    }

    let mut builder = RedisConnector::builder().port(args.port).endpoint(&args.host);
    if let Some(password) = args.password {
        builder = builder.password(password);
    }
    let connector = builder.build().context("invalid host")?;
    info!(address = connector.address(), "Connecting");
    let client = ResilientClient::with_config(connector, &settings.client);
    client
        .ping()
        .await
        .context("failed to connect to the cache node")?;
    info!("Connected");

    let recommender = Recommender::new(settings.analyzer.thresholds);
    let analyzer = Analyzer::new(&client, settings.analyzer);
    let result = analyzer.run().await.context("analysis failed")?;

    print!(
        "{}",
        report::render_analysis(&result, &recommender, args.detailed)
    );

    if let Some(path) = args.export {
        export_json(&result.big_keys, &path)?;
        println!("Report exported to {}", path.display());
    }

    client.disconnect();
    ensure_complete(&result)
}
