use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cloud_ratelimit::config::{LoggingConfig, ServiceConfig};
use cloud_ratelimit::ratelimit::{LimiterSpec, OperationKey};
use cloud_ratelimit::{CallContext, CallRateLimiter, RateLimitKey, RateLimiterRegistry};

/// Validate and exercise per-operation cloud API rate limits.
#[derive(Debug, Parser)]
#[command(name = "cloud-ratelimit", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rate limit spec, e.g. "ga.Addresses.Get,qps,1.5,5". May be repeated.
    #[arg(long = "ratelimit", value_name = "SPEC", global = true)]
    ratelimit: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the registry and list the configured limits
    Check {
        /// Print the limits as JSON
        #[arg(long)]
        json: bool,
    },
    /// Admit a series of calls for one operation and report the waits
    Simulate {
        /// Operation as [version].[service].[operation]
        #[arg(long)]
        key: String,

        /// Caller identity attached to each call
        #[arg(long, default_value = "")]
        caller_id: String,

        /// Number of calls to admit
        #[arg(long, default_value_t = 10)]
        calls: u32,

        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
struct LimitSummary {
    key: OperationKey,
    qps: f32,
    burst: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config =
        ServiceConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.rate_limiting.specs.extend(cli.ratelimit.iter().cloned());

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        specs = config.rate_limiting.specs.len(),
        "Configuration loaded"
    );

    let registry = config
        .build_registry()
        .context("Invalid rate limit configuration")?;

    match cli.command {
        Command::Check { json } => check(registry.as_ref(), json),
        Command::Simulate {
            key,
            caller_id,
            calls,
            timeout_ms,
        } => {
            let key = parse_operation(&key)?.with_caller_id(caller_id);
            simulate(&registry, &key, calls, timeout_ms.map(Duration::from_millis)).await
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_operation(key: &str) -> anyhow::Result<RateLimitKey> {
    // Reuse the spec grammar so keys are split exactly as configured ones are.
    let spec = LimiterSpec::parse(&format!("{key},qps,1,1"))
        .with_context(|| format!("Invalid operation key {key:?}"))?;
    Ok(RateLimitKey::from(spec.key))
}

fn check(registry: Option<&RateLimiterRegistry>, json: bool) -> anyhow::Result<()> {
    let mut limits: Vec<LimitSummary> = registry
        .into_iter()
        .flat_map(|registry| registry.iter())
        .map(|(key, limiter)| LimitSummary {
            key: key.clone(),
            qps: limiter.qps(),
            burst: limiter.burst(),
        })
        .collect();
    limits.sort_by_key(|limit| limit.key.to_string());

    if json {
        println!("{}", serde_json::to_string_pretty(&limits)?);
        return Ok(());
    }

    if limits.is_empty() {
        println!("no rate limiting configured");
        return Ok(());
    }

    for limit in &limits {
        if limit.burst < 1 {
            warn!(key = %limit.key, burst = limit.burst, "Burst below 1 never admits a call");
        }
        println!("{}\tqps={}\tburst={}", limit.key, limit.qps, limit.burst);
    }

    Ok(())
}

async fn simulate(
    limiter: &impl CallRateLimiter,
    key: &RateLimitKey,
    calls: u32,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut admitted = 0u32;

    for call in 1..=calls {
        let ctx = match timeout {
            Some(timeout) => CallContext::with_timeout(timeout),
            None => CallContext::background(),
        };

        let waited = Instant::now();
        match limiter.admit(&ctx, key).await {
            Ok(()) => {
                admitted += 1;
                info!(
                    key = %key,
                    call,
                    wait_ms = waited.elapsed().as_millis() as u64,
                    "Call admitted"
                );
            }
            Err(e) if e.is_context_error() => {
                warn!(key = %key, call, error = %e, "Call not admitted")
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!(
        "admitted {}/{} calls for {} in {:.3}s",
        admitted,
        calls,
        key,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
