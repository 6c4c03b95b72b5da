//! Failover drill: keeps traffic flowing (or watches connectivity) while a
//! cache node fails over, retrying every command with backoff.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use keyward::redis::RedisConnector;
use keyward::{LoadConfig, MaxAttempts, MonitorConfig, ResilientClient, monitor, simulate_load};
use keyward_cli::{ctrl_c, init_tracing, load_settings, parse_duration, report};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "keyward-failover", version, about)]
struct Args {
    /// Cache endpoint: host, host:port or redis:// URL.
    endpoint: String,

    /// Namespace for the keys written by the drill.
    identifier: String,

    /// `load` (simulate application traffic) or `monitor` (poll connectivity).
    #[arg(default_value = "monitor")]
    mode: String,

    /// Port used when the endpoint does not carry one.
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Run time of the load simulation.
    #[arg(long, default_value = "300s", value_parser = parse_duration)]
    duration: Duration,

    /// Pause between monitor polls.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    interval: Duration,

    /// Attempts per command, including the first [default: 5].
    #[arg(long)]
    max_attempts: Option<u16>,

    /// Maximum pooled connections [default: 10].
    #[arg(long)]
    pool_size: Option<NonZeroUsize>,

    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Load,
    Monitor,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "load" => Ok(Self::Load),
            "monitor" => Ok(Self::Monitor),
            other => bail!("invalid mode `{other}`, expected `load` or `monitor`"),
        }
    }
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
    let mode: Mode = args.mode.parse()?;

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(max_attempts) = args.max_attempts {
        settings.client.max_attempts = MaxAttempts::new(max_attempts)
            .with_context(|| format!("--max-attempts must be between 1 and 1000, got {max_attempts}"))?;
    }
    if let Some(pool_size) = args.pool_size {
        settings.client.pool.max_size = pool_size;
    }

    let connector = RedisConnector::builder()
        .port(args.port)
        .endpoint(&args.endpoint)
        .build()
        .context("invalid endpoint")?;
    info!(address = connector.address(), "Resilient client initialized");
    let client = ResilientClient::with_config(connector, &settings.client);

    client
        .ping()
        .await
        .context("initial connectivity check failed")?;
    info!("Initial connectivity confirmed");

    match mode {
        Mode::Load => {
            let config = LoadConfig::new(args.identifier.as_str()).duration(args.duration);
            let load = simulate_load(&client, &config, ctrl_c()).await;
            print!("{}", report::render_load(&load));
        }
        Mode::Monitor => {
            info!("Press Ctrl+C to stop");
            let config = MonitorConfig::new(args.identifier.as_str()).interval(args.interval);
            monitor(&client, &config, ctrl_c()).await;
        }
    }

    client.disconnect();
    Ok(())
}
