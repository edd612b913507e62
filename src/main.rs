use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use feedcrawl::config::{Config, CONFIG_FILE_NAME};
use feedcrawl::crawl::{CrawlResult, Crawler, FeedUpdate};
use feedcrawl::feed::HttpFetcher;

#[derive(Parser, Debug)]
#[command(
    name = "feedcrawl",
    about = "Crawl RSS/Atom feeds and print the items that are new since the last run"
)]
struct Args {
    /// Config file (default: feedcrawl.toml in the current or executable directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// State file, overriding `crawler.state_file`
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Number of concurrent fetch workers, overriding `crawler.workers`
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Crawl without writing the state file
    #[arg(long)]
    no_save: bool,
}

/// Writes the `[title (uri)]` header, one `title (link)` line per new item
/// and a blank separator line. The header is written even with no new items.
fn write_update(out: &mut impl Write, uri: &str, update: &FeedUpdate) -> io::Result<()> {
    writeln!(out, "[{} ({})]", update.feed.title, uri)?;
    for item in &update.new_items {
        writeln!(out, "{} ({})", item.title, item.link)?;
    }
    writeln!(out)
}

fn print_result(result: &CrawlResult) {
    match &result.result {
        Ok(update) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = write_update(&mut stdout, result.subscription.uri(), update) {
                tracing::warn!(error = %e, "Failed to write crawl output");
            }
        }
        Err(e) => eprintln!("{}: {}", result.subscription.id(), e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::find(CONFIG_FILE_NAME)
            .with_context(|| format!("Cannot find config file: {}", CONFIG_FILE_NAME))?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config file: {}", config_path.display()))?;

    let subscriptions = config
        .subscriptions()
        .context("Invalid feed configuration")?;
    if subscriptions.is_empty() {
        eprintln!("Warning: No feeds configured in {}", config_path.display());
    }

    let fetcher = HttpFetcher::new(reqwest::Client::new()).with_timeout(config.crawler.timeout());
    let mut crawler =
        Crawler::new(Arc::new(fetcher)).with_workers(args.workers.unwrap_or(config.crawler.workers));

    let state_file = args.state_file.or(config.crawler.state_file);
    let prior = match &state_file {
        Some(path) if args.no_save => Some(
            feedcrawl::state::StateStore::load(path)
                .with_context(|| format!("Failed to load state file: {}", path.display()))?,
        ),
        Some(path) => {
            crawler = crawler.with_state_file(path);
            None
        }
        None => None,
    };

    crawler
        .crawl_with(&subscriptions, prior, |result| print_result(&result))
        .await
        .context("Crawl failed")?;

    Ok(())
}
