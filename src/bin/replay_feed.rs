//! Replay a captured feed through the book reconstructor.
//!
//! Seeds the book from a full-depth snapshot (optional), then applies every
//! record of a JSON-lines capture and prints the top of book whenever a
//! record changes it.
//!
//! # Usage
//!
//! ```bash
//! # Replay a single-product capture on top of a snapshot
//! cargo run --release --bin replay_feed -- \
//!     --snapshot data/BTC-USD_snapshot.json \
//!     --feed data/BTC-USD_2024-03-01.jsonl
//!
//! # Multiplexed capture: only follow one product, 10 levels
//! cargo run --release --bin replay_feed -- \
//!     --feed data/full_2024-03-01.jsonl --product ETH-USD --depth 10
//!
//! # Read records from stdin, print only the final book
//! cat capture.jsonl | cargo run --release --bin replay_feed -- --feed - --quiet
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;

use l3_lob_reconstructor::source::{FeedSource, JsonLinesIter, JsonLinesSource};
use l3_lob_reconstructor::{
    BookConfig, BookError, BookReconstructor, MultiProductBook, ProcessOutcome, Result,
    SeedSnapshot,
};

/// Command-line arguments
struct Args {
    /// Seed snapshot JSON file
    snapshot: Option<PathBuf>,
    /// JSON-lines feed file, `-` for stdin
    feed: PathBuf,
    /// Levels cached per side
    depth: usize,
    /// Only follow records for this product_id
    product: Option<String>,
    /// Where to write the warning report
    warnings: Option<PathBuf>,
    /// Print only the final book
    quiet: bool,
}

fn parse_args() -> std::result::Result<Args, String> {
    let args: Vec<String> = env::args().collect();

    let mut snapshot: Option<PathBuf> = None;
    let mut feed: Option<PathBuf> = None;
    let mut depth = l3_lob_reconstructor::DEFAULT_DEPTH;
    let mut product: Option<String> = None;
    let mut warnings: Option<PathBuf> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--snapshot" | "-s" => {
                i += 1;
                let value = args.get(i).ok_or("--snapshot requires a path")?;
                snapshot = Some(PathBuf::from(value));
            }
            "--feed" | "-f" => {
                i += 1;
                let value = args.get(i).ok_or("--feed requires a path")?;
                feed = Some(PathBuf::from(value));
            }
            "--depth" | "-d" => {
                i += 1;
                let value = args.get(i).ok_or("--depth requires a number")?;
                depth = value
                    .parse()
                    .map_err(|_| format!("Invalid depth: {}", value))?;
            }
            "--product" | "-p" => {
                i += 1;
                let value = args.get(i).ok_or("--product requires a product id")?;
                product = Some(value.clone());
            }
            "--warnings" | "-w" => {
                i += 1;
                let value = args.get(i).ok_or("--warnings requires a path")?;
                warnings = Some(PathBuf::from(value));
            }
            "--quiet" | "-q" => {
                quiet = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                // Positional: the feed file
                if feed.is_none() {
                    feed = Some(PathBuf::from(arg));
                } else {
                    return Err(format!("Unknown argument: {}", arg));
                }
            }
        }
        i += 1;
    }

    let feed = feed.ok_or("Feed path is required")?;

    Ok(Args {
        snapshot,
        feed,
        depth,
        product,
        warnings,
        quiet,
    })
}

fn print_help() {
    eprintln!(
        r#"
Replay Feed

Rebuilds a depth-limited order book from a seed snapshot and a captured
stream of open/done/match records.

USAGE:
    replay_feed [OPTIONS] --feed <PATH>
    replay_feed [OPTIONS] <FEED>

OPTIONS:
    -s, --snapshot <PATH>   Seed snapshot ({{"bids": [...], "asks": [...]}})
    -f, --feed <PATH>       JSON-lines feed capture, '-' for stdin
    -d, --depth <N>         Levels per side (default: 5)
    -p, --product <ID>      Only follow records with this product_id
    -w, --warnings <PATH>   Write a JSON warning report
    -q, --quiet             Print only the final book
    -h, --help              Print this help message

ENVIRONMENT:
    RUST_LOG                Log filter (default: info)
"#
    );
}

/// Single book, or one product routed out of a multiplexed feed.
enum Replay {
    Single(BookReconstructor),
    Routed {
        books: MultiProductBook,
        product: String,
    },
}

impl Replay {
    fn new(config: BookConfig, snapshot: Option<&SeedSnapshot>, product: Option<String>) -> Result<Self> {
        match product {
            None => Ok(Replay::Single(match snapshot {
                Some(snapshot) => BookReconstructor::from_snapshot(config, snapshot),
                None => BookReconstructor::with_config(config),
            })),
            Some(product) => {
                let mut books = MultiProductBook::new(config);
                match snapshot {
                    Some(snapshot) => books.add_product_with_snapshot(product.as_str(), snapshot)?,
                    None => books.add_product(product.as_str())?,
                }
                Ok(Replay::Routed { books, product })
            }
        }
    }

    fn process(&mut self, record: &Value) -> ProcessOutcome {
        match self {
            Replay::Single(book) => book.process_value(record),
            Replay::Routed { books, .. } => books.process_value(record),
        }
    }

    fn book(&self) -> Result<&BookReconstructor> {
        match self {
            Replay::Single(book) => Ok(book),
            Replay::Routed { books, product } => books.book(product),
        }
    }
}

fn open_feed(path: &Path) -> Result<Box<dyn Iterator<Item = Value>>> {
    if path.as_os_str() == "-" {
        log::info!("Reading feed records from stdin");
        return Ok(Box::new(JsonLinesIter::from_reader(Box::new(
            std::io::stdin(),
        ))));
    }

    let source = JsonLinesSource::new(path);
    let metadata = source.metadata();
    log::info!(
        "Feed {} (product {:?}, date {:?}, {} bytes)",
        path.display(),
        metadata.product_id,
        metadata.date,
        metadata.file_size.unwrap_or(0)
    );
    Ok(Box::new(source.records()?))
}

fn run(args: Args) -> Result<()> {
    let config = BookConfig::new(args.depth).with_warning_tracking(args.warnings.is_some());

    let snapshot = match &args.snapshot {
        Some(path) => {
            let snapshot = SeedSnapshot::from_file(path).map_err(|e| {
                BookError::generic(format!("Failed to load snapshot {}: {}", path.display(), e))
            })?;
            log::info!("Loaded snapshot {} ({} entries)", path.display(), snapshot.len());
            Some(snapshot)
        }
        None => None,
    };

    let mut replay = Replay::new(config, snapshot.as_ref(), args.product.clone())?;
    if !args.quiet {
        println!("{}", replay.book()?.top_of_book());
    }

    let start = Instant::now();
    let mut records = 0u64;
    for record in open_feed(&args.feed)? {
        records += 1;
        let outcome = replay.process(&record);
        if outcome.rebuilt() && !args.quiet {
            println!("\n{}", replay.book()?.top_of_book());
        }
    }
    let elapsed = start.elapsed().as_secs_f64();

    let book = replay.book()?;
    let stats = book.stats();

    if args.quiet {
        println!("{}", book.top_of_book());
    }

    println!("\n{}", "=".repeat(60));
    println!("Replay Complete!");
    println!("  Records read: {}", records);
    println!("  Opens: {}", stats.opens);
    println!("  Removals: {}", stats.removals);
    println!("  Missing orders: {}", stats.missing_orders);
    println!("  Ignored: {}", stats.ignored);
    println!("  Malformed: {}", stats.malformed);
    println!("  Crossed purges: {} ({} orders)", stats.crossed_purges, stats.purged_orders);
    println!("  Cache rebuilds: {}", stats.rebuilds);
    println!("  Active orders: {}", stats.active_orders);
    println!("  Book: {:?}", book.consistency());
    if elapsed > 0.0 {
        println!(
            "  Throughput: {:.0} records/s",
            records as f64 / elapsed
        );
    }

    if let Replay::Routed { books, .. } = &replay {
        let routing = books.stats();
        println!("  Other products skipped: {}", routing.unrouted);
        println!("  Records without product_id: {}", routing.malformed);
    }

    if let (Some(path), Some(tracker)) = (&args.warnings, book.warnings()) {
        tracker.export_to_file(path)?;
        println!("  Warnings: {} (written to {})", tracker.total_count(), path.display());
    }

    Ok(())
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
