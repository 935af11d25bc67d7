//! multisend command-line entry point
//!
//! Reads a newline-separated recipient list, validates it, and pays every valid
//! recipient the same amount using a local keypair as the signer.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multisend::address::{parse_address, validate_addresses};
use multisend::config::Config;
use multisend::metrics::metrics;
use multisend::rpc_manager::SolanaRpcClient;
use multisend::signer::{KeypairSigner, SignerGateway, SignerProvider};
use multisend::tx_builder::DecimalAmount;
use multisend::types::{TransferSummary, ValidationReport};
use multisend::{BatchOrchestrator, TransferRequest, TransferResult};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// File with one recipient address per line
    #[arg(short, long)]
    recipients: String,

    /// Amount paid to each recipient, in whole SOL or token units
    #[arg(short, long)]
    amount: String,

    /// SPL token mint; pays native SOL when omitted
    #[arg(long)]
    mint: Option<String>,

    /// Keypair file overriding `signer.keypair_path`
    #[arg(short, long, env = "KEYPAIR_PATH")]
    keypair: Option<String>,

    /// Only validate the recipient list
    #[arg(long)]
    validate_only: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_found) = load_config(&args.config)?;
    init_logging(args.verbose, config.logging.json, &config.logging.level)?;
    if !config_found {
        warn!("Config file '{}' not found, using defaults", args.config);
    }
    info!("multisend v{}", env!("CARGO_PKG_VERSION"));

    let raw = read_recipients(&args.recipients)?;
    let report = validate_addresses(&raw);
    report_validation(&report);

    if args.validate_only {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{} valid, {} invalid, {} duplicated",
                report.valid.len(),
                report.invalid.len(),
                report.duplicates.len()
            );
        }
        return Ok(());
    }

    if report.valid.is_empty() {
        anyhow::bail!("No valid recipients in {}", args.recipients);
    }

    config.validate().context("Invalid configuration")?;

    let amount: DecimalAmount = args.amount.parse().context("Invalid --amount")?;
    let mint = args
        .mint
        .as_deref()
        .map(parse_address)
        .transpose()
        .context("Invalid --mint")?;

    let keypair_path = args.keypair.unwrap_or_else(|| config.signer.keypair_path.clone());
    let signer = KeypairSigner::from_file(&keypair_path).context("Failed to load keypair")?;
    info!("Paying from {}", signer.pubkey());

    let providers: Vec<Arc<dyn SignerProvider>> = vec![Arc::new(signer)];
    let gateway = SignerGateway::new(providers, Duration::from_millis(config.signer.timeout_ms));

    info!("Connecting to {}", config.rpc.url);
    let network = Arc::new(SolanaRpcClient::new(&config.rpc).context("Failed to create RPC client")?);
    let orchestrator = BatchOrchestrator::new(network, gateway, &config)?;

    let request = TransferRequest {
        recipients: report.valid,
        amount_per_recipient: amount,
        asset: mint,
    };
    let results = orchestrator.transfer(&request).await?;
    let summary = TransferSummary::from_results(&results);

    if args.json {
        let output = serde_json::json!({ "results": results, "summary": summary });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_results(&results, &summary);
    }

    if args.print_metrics {
        println!("{}", metrics().encode()?);
    }

    if summary.batches_failed > 0 {
        anyhow::bail!(
            "{} of {} batches failed",
            summary.batches_failed,
            summary.batches_total
        );
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(verbose: bool, json: bool, level: &str) -> Result<()> {
    let default_filter = if verbose {
        "multisend=debug,info".to_string()
    } else {
        format!("multisend={},warn", level)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

/// Load configuration from file, falling back to defaults plus environment overrides
fn load_config(path: &str) -> Result<(Config, bool)> {
    if std::path::Path::new(path).exists() {
        let config = Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))?;
        Ok((config, true))
    } else {
        Ok((Config::from_env()?, false))
    }
}

fn read_recipients(path: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipients file: {}", path))?;
    Ok(parse_recipient_lines(&content))
}

/// One address per line; blank lines and `#` comments are skipped
fn parse_recipient_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn report_validation(report: &ValidationReport) {
    for address in &report.invalid {
        warn!(address = %address, "Skipping invalid address");
    }
    for address in &report.duplicates {
        warn!(address = %address, "Skipping duplicated address");
    }
    info!(
        valid = report.valid.len(),
        invalid = report.invalid.len(),
        duplicates = report.duplicates.len(),
        "Recipient list validated"
    );
}

fn print_results(results: &[TransferResult], summary: &TransferSummary) {
    for result in results {
        let status = if result.is_success() { "ok" } else { "FAILED" };
        let signature = if result.signature.is_empty() {
            "-"
        } else {
            result.signature.as_str()
        };
        print!(
            "batch {:>3}  {:<6}  {} recipients  attempts {}  {}",
            result.batch_index,
            status,
            result.recipients.len(),
            result.attempts,
            signature
        );
        match &result.error_message {
            Some(message) => println!("  ({})", message),
            None => println!(),
        }
    }
    println!(
        "{}/{} batches confirmed, {} recipients paid, {} unpaid",
        summary.batches_succeeded,
        summary.batches_total,
        summary.recipients_paid,
        summary.recipients_unpaid
    );
}
