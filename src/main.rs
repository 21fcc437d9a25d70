use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use turnstile::config::{LogFormat, LoggingConfig, TurnstileConfig};
use turnstile::ratelimit::{BucketState, KeyBuilder, PresetId, PresetRegistry, RateLimiter};
use turnstile::TurnstileError;

/// Token-bucket rate limiter tooling.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Cli {
    /// YAML configuration file (environment overrides use the TURNSTILE__ prefix)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configured presets and print them as JSON
    Presets,
    /// Fire concurrent acquisitions at one key and report the outcome
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Preset to acquire against
    #[arg(long, default_value = "default")]
    preset: String,

    /// Route part of the bucket key
    #[arg(long, default_value = "home")]
    route: String,

    /// Client part of the bucket key
    #[arg(long, default_value = "127.0.0.1")]
    client: String,

    /// Total number of acquisitions
    #[arg(long, default_value_t = 100)]
    requests: u32,

    /// Number of concurrent tasks sharing the requests
    #[arg(long, default_value_t = 4)]
    concurrency: u32,

    /// Tokens taken per acquisition
    #[arg(long, default_value_t = 1)]
    cost: u32,
}

#[derive(Debug, Default, Serialize)]
struct Tally {
    allowed: u64,
    denied: u64,
    max_retry_after_secs: u64,
}

impl Tally {
    fn merge(&mut self, other: Tally) {
        self.allowed += other.allowed;
        self.denied += other.denied;
        self.max_retry_after_secs = self.max_retry_after_secs.max(other.max_retry_after_secs);
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    key: String,
    preset: PresetId,
    requests: u32,
    concurrency: u32,
    #[serde(flatten)]
    tally: Tally,
    snapshot: Option<BucketState>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = TurnstileConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging)?;

    info!("Starting Turnstile");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let registry = PresetRegistry::from_settings(&config.rate_limit)?;
    let limiter = Arc::new(RateLimiter::new(registry));
    let keys = KeyBuilder::new(config.rate_limit.namespace.clone());
    info!(namespace = %keys.namespace(), "Rate limiter initialized");

    match cli.command {
        Command::Presets => print_presets(&limiter, &keys)?,
        Command::Simulate(args) => {
            let eviction = match config.rate_limit.eviction_interval_secs {
                0 => None,
                secs => Some(Arc::clone(&limiter).spawn_eviction_task(Duration::from_secs(secs))),
            };

            let result = simulate(Arc::clone(&limiter), &keys, args).await;

            if let Some(handle) = eviction {
                handle.abort();
            }
            result?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)?,
    };

    // stdout carries the JSON reports
    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
    Ok(())
}

fn print_presets(limiter: &RateLimiter, keys: &KeyBuilder) -> anyhow::Result<()> {
    let registry = limiter.registry();
    if registry.is_empty() {
        warn!("No presets configured; every acquisition will fail");
    }

    let presets: Vec<_> = registry
        .iter()
        .map(|(id, preset)| serde_json::json!({ "name": id, "preset": preset }))
        .collect();
    let listing = serde_json::json!({
        "namespace": keys.namespace(),
        "presets": presets,
    });

    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

async fn simulate(
    limiter: Arc<RateLimiter>,
    keys: &KeyBuilder,
    args: SimulateArgs,
) -> anyhow::Result<()> {
    anyhow::ensure!(args.concurrency > 0, "concurrency must be at least 1");

    let preset = limiter.registry().resolve(&args.preset)?;
    let key = keys.key(&args.route, &args.client).to_string_key();

    info!(
        key = %key,
        preset = %preset,
        requests = args.requests,
        concurrency = args.concurrency,
        "Running simulation"
    );

    let base = args.requests / args.concurrency;
    let extra = args.requests % args.concurrency;
    let mut tasks = JoinSet::new();

    for worker in 0..args.concurrency {
        let count = base + u32::from(worker < extra);
        let limiter = Arc::clone(&limiter);
        let key = key.clone();
        let preset = preset.clone();
        let cost = args.cost;

        tasks.spawn(async move {
            let mut tally = Tally::default();
            for _ in 0..count {
                let decision = limiter.check_with_cost(&key, &preset, cost)?;
                if decision.allowed {
                    tally.allowed += 1;
                } else {
                    tally.denied += 1;
                    tally.max_retry_after_secs =
                        tally.max_retry_after_secs.max(decision.retry_after_secs());
                }
                tokio::task::yield_now().await;
            }
            Ok::<_, TurnstileError>(tally)
        });
    }

    let mut total = Tally::default();
    while let Some(joined) = tasks.join_next().await {
        total.merge(joined??);
    }

    let report = SimulationReport {
        snapshot: limiter.snapshot(&key),
        key,
        preset,
        requests: args.requests,
        concurrency: args.concurrency,
        tally: total,
    };

    info!(allowed = report.tally.allowed, denied = report.tally.denied, "Simulation finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
