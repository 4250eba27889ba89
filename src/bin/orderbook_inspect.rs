//! Orderbook Inspection Tool
//!
//! Describes a captured order book file (and optionally a trade tape) before
//! running the analysis: books per exchange, time span, depth, minute coverage
//! and the first levels of the first book.
//!
//! Usage:
//!   cargo run --release --bin orderbook_inspect -- --orderbooks ./orderbooks.json
//!   cargo run --release --bin orderbook_inspect -- --orderbooks ./orderbooks.json --trades ./trades.csv --json

use anyhow::{Context, Result};
use aptlab_backend::analysis::time_buckets::format_nanos;
use aptlab_backend::analysis::{
    load_trade_tape, AnalysisConfig, BucketGranularity, DatasetDescription, OrderbookRepository,
    OrderbookSnapshot, Side, TradeTapeDescription,
};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Orderbook Inspection Tool for APT Lab captures
#[derive(Parser, Debug)]
#[command(name = "orderbook_inspect")]
#[command(about = "Describe captured order books and trade tapes")]
struct Cli {
    /// Orderbook JSON file
    #[arg(short, long)]
    orderbooks: PathBuf,

    /// Optional trade tape
    #[arg(short, long)]
    trades: Option<PathBuf>,

    /// Bucket width in seconds used for the coverage report
    #[arg(short, long, default_value = "60")]
    bucket_secs: u64,

    /// Accept books whose best bid is above the best ask
    #[arg(long)]
    allow_crossed: bool,

    /// Emit descriptions as JSON instead of tables
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AnalysisConfig {
        bucket_secs: cli.bucket_secs,
        reject_crossed_levels: !cli.allow_crossed,
        ..AnalysisConfig::default()
    };
    let granularity = config.granularity().context("Invalid bucket width")?;

    let repository = OrderbookRepository::load(&cli.orderbooks, config.reject_crossed_levels)
        .with_context(|| format!("Failed to load order books: {:?}", cli.orderbooks))?;
    let descriptions: Vec<DatasetDescription> = repository
        .iter()
        .map(|(exchange, snapshots)| DatasetDescription::new(exchange, snapshots))
        .collect();

    let tape = match &cli.trades {
        Some(path) => Some(
            load_trade_tape(path).with_context(|| format!("Failed to load trades: {:?}", path))?,
        ),
        None => None,
    };

    if cli.json {
        let doc = serde_json::json!({
            "orderbooks": descriptions,
            "trades": tape.as_deref().map(TradeTapeDescription::new),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║               APT LAB ORDERBOOK INSPECTION TOOL                ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!();
    println!("Order books: {:?}", cli.orderbooks);
    println!();

    println!("=== Exchanges ===\n");
    println!(
        "{:>12} {:>8} {:>26} {:>26} {:>6}",
        "Exchange", "Books", "First", "Last", "Depth"
    );
    println!("{}", "-".repeat(82));
    for d in &descriptions {
        println!(
            "{:>12} {:>8} {:>26} {:>26} {:>6}",
            d.exchange,
            d.books,
            d.first.map(format_nanos).unwrap_or_else(|| "-".to_string()),
            d.last.map(format_nanos).unwrap_or_else(|| "-".to_string()),
            d.max_depth
        );
    }

    for (exchange, snapshots) in repository.iter() {
        show_coverage(exchange, snapshots, granularity);
    }

    for d in &descriptions {
        println!("\n=== First Book: {} ===\n", d.exchange);
        if d.first_levels.is_empty() {
            println!("No books.");
            continue;
        }
        println!(
            "{:>6} {:>12} {:>14} {:>14} {:>12}",
            "Level", "Bid Size", "Bid", "Ask", "Ask Size"
        );
        for (i, level) in d.first_levels.iter().enumerate() {
            println!(
                "{:>6} {:>12.6} {:>14.2} {:>14.2} {:>12.6}",
                i, level.bid_size, level.bid, level.ask, level.ask_size
            );
        }
    }

    if let Some(trades) = &tape {
        let description = TradeTapeDescription::new(trades);
        let sells = trades.iter().filter(|t| t.side == Side::Sell).count();
        println!("\n=== Trade Tape ===\n");
        println!("  Trades: {}", description.trades);
        println!(
            "  Range:  {} .. {}",
            description.first.map(format_nanos).unwrap_or_else(|| "-".to_string()),
            description.last.map(format_nanos).unwrap_or_else(|| "-".to_string())
        );
        println!("  Sells:  {}", sells);
        println!("  Buys:   {}", description.trades - sells);
    }

    Ok(())
}

/// Occupied vs spanned buckets; gaps become empty top-of-book bins.
fn show_coverage(exchange: &str, snapshots: &[OrderbookSnapshot], granularity: BucketGranularity) {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return;
    };
    let occupied: BTreeSet<i64> = snapshots
        .iter()
        .map(|s| granularity.index(s.timestamp))
        .collect();
    let spanned = granularity.index(last.timestamp) - granularity.index(first.timestamp) + 1;
    let first_bucket = granularity.bounds(first.timestamp);
    let last_bucket = granularity.bounds(last.timestamp);

    println!("\n=== Coverage: {} ===\n", exchange);
    println!(
        "  Buckets: {} occupied of {} spanned ({} empty)",
        occupied.len(),
        spanned,
        spanned - occupied.len() as i64
    );
    println!(
        "  First bucket: [{}, {})",
        format_nanos(first_bucket.start),
        format_nanos(first_bucket.end)
    );
    println!(
        "  Last bucket:  [{}, {})",
        format_nanos(last_bucket.start),
        format_nanos(last_bucket.end)
    );
}
