//! APT Lab
//!
//! Runs the martingale experiments, the Roll spread model and the trade-side
//! probability evolution over a captured order book file, prints a report and
//! optionally exports the result bundle as JSON for charting.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin aptlab -- ./orderbooks.json \
//!   --trades ./trades.csv \
//!   --exchange bitfinex \
//!   --output results.json
//! ```

use anyhow::{Context, Result};
use aptlab_backend::analysis::time_buckets::format_nanos;
use aptlab_backend::analysis::{
    load_trade_tape, AnalysisConfig, AnalysisPipeline, ExchangeReport, ExperimentSummary,
    ExperimentTable, OrderbookRepository, ProbabilitySummary, ResultBundle, SpreadSummary,
};
use clap::Parser;
use dotenv::dotenv;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// APT martingale and Roll spread analysis over captured order books
#[derive(Parser, Debug)]
#[command(name = "aptlab")]
#[command(about = "Martingale experiments and Roll spread estimation over order book captures")]
struct Args {
    /// Orderbook JSON file (exchange -> timestamp -> snapshot)
    #[arg(env = "APTLAB_ORDERBOOKS")]
    orderbooks: PathBuf,

    /// Trade tape (CSV, or JSON when the extension is .json)
    #[arg(short, long, env = "APTLAB_TRADES")]
    trades: Option<PathBuf>,

    /// Only analyse these exchanges (repeatable; default: all)
    #[arg(short, long = "exchange")]
    exchanges: Vec<String>,

    /// Path to TOML analysis configuration
    #[arg(short, long, env = "APTLAB_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Write the result bundle as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rows shown per table preview
    #[arg(short, long, default_value = "30")]
    preview: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config: {:?}", path))?,
        None => AnalysisConfig::from_env(),
    };
    info!(
        "Config: {}s buckets, {} trade sample, degenerate books {:?}",
        config.bucket_secs, config.trade_sample_size, config.degenerate_policy
    );

    let repository = OrderbookRepository::load(&args.orderbooks, config.reject_crossed_levels)
        .with_context(|| format!("Failed to load order books: {:?}", args.orderbooks))?;
    if repository.is_empty() {
        warn!("No exchanges in {:?}", args.orderbooks);
    }

    let trades = match &args.trades {
        Some(path) => Some(
            load_trade_tape(path).with_context(|| format!("Failed to load trades: {:?}", path))?,
        ),
        None => None,
    };

    let pipeline = AnalysisPipeline::new(&config).context("Invalid analysis configuration")?;
    let bundle = pipeline
        .run(&repository, trades.as_deref(), &args.exchanges)
        .context("Analysis failed")?;

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║                 APT MARTINGALE & ROLL SPREAD                   ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Order books: {:?}", args.orderbooks);
    if let Some(path) = &args.trades {
        println!("Trades:      {:?}", path);
    }
    println!();

    for (exchange, report) in &bundle.exchanges {
        print_report(exchange, report, args.preview);
    }

    if let Some(path) = &args.output {
        write_bundle(&bundle, path)?;
        println!("Results written to {:?}", path);
    }

    Ok(())
}

fn print_report(exchange: &str, report: &ExchangeReport, preview: usize) {
    println!("=== {} ===\n", exchange.to_uppercase());

    print_table("All orders / simple mid", &report.apt_all.simple_mid_price, preview);
    print_table("All orders / weighted mid", &report.apt_all.weighted_mid_price, preview);
    print_table("Top of book / simple mid", &report.apt_tob.simple_mid_price, preview);
    print_table(
        "Top of book / weighted mid (depth imbalance)",
        &report.apt_tob.weighted_mid_price_a,
        preview,
    );
    print_table(
        "Top of book / weighted mid (level 0)",
        &report.apt_tob.weighted_mid_price_b,
        preview,
    );

    let spread = SpreadSummary::from_definition(&report.roll.spread_definition);
    println!("--- Roll spread ---");
    println!("  Observations:          {}", spread.observations);
    println!("  gamma_1:               {:.8}", spread.gamma_1);
    println!("  Overall spread (S):    {:.6}", spread.overall_spread);
    if spread.positive_covariance {
        println!("  WARNING: positive autocovariance, S uses |gamma_1|");
    }
    println!(
        "  Positive running gamma: {} rows",
        spread.positive_running_estimates
    );
    println!("  Mean real spread:      {:.6}", spread.mean_real_spread);
    if let Some(mean) = spread.mean_theoretical_spread {
        println!("  Mean theoretical:      {:.6}", mean);
    }
    if let Some(mean) = spread.mean_spread_diff {
        println!("  Mean spread diff:      {:.6}", mean);
    }
    println!();

    match ProbabilitySummary::from_rows(&report.roll.prob_evolution) {
        Some(prob) => {
            println!("--- Trade side probability ---");
            println!("  Trades:        {}", prob.trades);
            println!("  Final P(sell): {:.4}", prob.final_prob_sell);
            println!("  Final P(buy):  {:.4}", prob.final_prob_buy);
        }
        None => println!("--- Trade side probability: no trade tape ---"),
    }
    println!();
}

fn print_table(title: &str, table: &ExperimentTable, preview: usize) {
    println!("--- {} ({} buckets) ---", title, table.len());

    if preview > 0 && !table.is_empty() {
        println!(
            "{:>26} {:>7} {:>7} {:>9} {:>9}",
            "Time", "Exp 1", "Exp 2", "P. Exp 1", "P. Exp 2"
        );
        println!("{}", "-".repeat(62));
        for bucket in table.head(preview) {
            println!(
                "{:>26} {:>7} {:>7} {:>9.2} {:>9.2}",
                format_nanos(bucket.time),
                bucket.exp_1,
                bucket.exp_2,
                bucket.p_exp_1,
                bucket.p_exp_2
            );
        }
    }

    match ExperimentSummary::from_table(table) {
        Some(summary) => {
            println!(
                "  min P. Exp 1: {:.2} at {}",
                summary.min_p_exp_1,
                format_nanos(summary.min_at)
            );
            println!(
                "  max P. Exp 1: {:.2} at {}",
                summary.max_p_exp_1,
                format_nanos(summary.max_at)
            );
            println!(
                "  mean P. Exp 1: {:.4} over {} of {} buckets",
                summary.mean_p_exp_1, summary.defined_buckets, summary.buckets
            );
        }
        None => println!("  no defined buckets"),
    }
    println!();
}

fn write_bundle(bundle: &ResultBundle, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    bundle
        .write_json(BufWriter::new(file))
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote {} exchange reports to {:?}", bundle.exchanges.len(), path);
    Ok(())
}
