//! IP signature filter CLI.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use ipsig::decision::Verdict;
use ipsig::factors::{address_range, expand_ipv4, expand_ipv6, is_ipv4, is_ipv6};
use ipsig::{Config, Engine, Evaluation, EvaluationError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ipsig")]
#[command(about = "IP signature filter - check client addresses against CIDR signature files")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ipsig.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check addresses against the configured signature files
    Check {
        #[arg(required = true, value_name = "ADDR")]
        addresses: Vec<String>,
    },
    /// Print the CIDR factors of an address
    Factors {
        #[arg(value_name = "ADDR")]
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(Command::Factors { address }) = &args.command {
        return print_factors(address, args.json);
    }

    // Load configuration
    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let Some(Command::Check { addresses }) = args.command else {
        info!("No command given, nothing to check");
        return Ok(());
    };

    let engine = Arc::new(Engine::new(config));
    engine.preload();

    let now = Utc::now();
    let handles: Vec<_> = addresses
        .into_iter()
        .map(|address| {
            let engine = engine.clone();
            tokio::task::spawn_blocking(move || {
                let result = engine.evaluate(&address, now);
                (address, result)
            })
        })
        .collect();

    let mut any_blocked = false;
    for handle in handles {
        let (address, result) = handle.await?;
        let verdict = engine.verdict(&result);
        any_blocked |= verdict == Verdict::Block;
        if args.json {
            println!("{}", json_report(&address, &result, verdict)?);
        } else {
            print_report(&address, &result, verdict);
        }
    }

    if any_blocked {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(address: &str, result: &Result<Evaluation, EvaluationError>, verdict: Verdict) {
    match result {
        Err(e) => {
            println!("Checking \"{}\" aborted: {} (treated as {:?}).", address, e, verdict);
        }
        Ok(_) if !is_ipv4(address) && !is_ipv6(address) => {
            println!(
                "The specified IP address, \"{}\", is not a valid IPv4 or IPv6 address!",
                address
            );
        }
        Ok(evaluation) if evaluation.is_blocked() => {
            println!(
                "The specified IP address, \"{}\", is blocked by one or more signatures.",
                address
            );
            println!("  Reason: {}", evaluation.decision.reason_message);
            println!("  Why: {}", evaluation.decision.why_reason);
            println!("  Signatures: {}", evaluation.decision.signatures);
        }
        Ok(_) => {
            println!(
                "The specified IP address, \"{}\", is *NOT* blocked by any signatures.",
                address
            );
        }
    }
}

fn json_report(
    address: &str,
    result: &Result<Evaluation, EvaluationError>,
    verdict: Verdict,
) -> Result<String> {
    let value = match result {
        Ok(evaluation) => serde_json::to_value(evaluation)?,
        Err(e) => json!({
            "address": address,
            "error": e.to_string(),
            "verdict": verdict,
        }),
    };
    Ok(serde_json::to_string(&value)?)
}

fn print_factors(address: &str, as_json: bool) -> Result<()> {
    let Some(factors) = expand_ipv4(address).or_else(|| expand_ipv6(address)) else {
        anyhow::bail!("Not a valid IPv4 or IPv6 address: {}", address);
    };

    for factor in &factors {
        let range = address_range(factor);
        if as_json {
            let (first, last) = match range {
                Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
                None => (None, None),
            };
            println!(
                "{}",
                serde_json::to_string(&json!({ "factor": factor, "first": first, "last": last }))?
            );
        } else if let Some((first, last)) = range {
            println!("{:<45} {} - {}", factor, first, last);
        } else {
            println!("{}", factor);
        }
    }
    Ok(())
}
