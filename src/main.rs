use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use subfresh::fetch::HttpFetcher;
use subfresh::settings::{self, SourceConfig};
use subfresh::store::{ConfigStore, FileStore, NoopCache};
use subfresh::updater::{UpdateService, DEFAULT_TEMPLATE_HEAD, DEFAULT_TEMPLATE_TAIL};

/// Fetches proxy subscription feeds and regenerates Clash and raw-link
/// subscription artifacts.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration store file
    #[arg(short, long, value_name = "FILE", default_value = "subfresh.json")]
    store: PathBuf,

    /// Path to the Clash template head
    #[arg(long, value_name = "FILE", default_value = DEFAULT_TEMPLATE_HEAD)]
    template_head: PathBuf,

    /// Path to the Clash template tail
    #[arg(long, value_name = "FILE", default_value = DEFAULT_TEMPLATE_TAIL)]
    template_tail: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one update now and exit
    Run,
    /// Fetch and parse the feeds without writing any artifact
    Check,
    /// Run updates on the configured schedule until interrupted
    Watch,
    /// Show the current task state and artifact report
    Status,
    /// Print the most recent run-log entries
    Logs {
        /// Maximum number of entries to print
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Update the stored source configuration
    Configure {
        /// Feed URL, repeatable; replaces the stored list when given
        #[arg(long = "feed", value_name = "URL")]
        feeds: Vec<String>,

        /// Filter keyword, repeatable; replaces the stored list when given
        #[arg(long = "keyword", value_name = "WORD")]
        keywords: Vec<String>,

        /// Update interval in seconds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,

        /// Output directory for generated artifacts
        #[arg(long, value_name = "DIR")]
        output_dir: Option<String>,

        /// Enable or disable the recurring schedule
        #[arg(long, value_name = "BOOL")]
        schedule: Option<bool>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let args = Args::parse();
    let store: Arc<dyn ConfigStore> = Arc::new(
        FileStore::open(&args.store)
            .with_context(|| format!("cannot open store {}", args.store.display()))?,
    );

    if let Command::Configure {
        feeds,
        keywords,
        interval,
        output_dir,
        schedule,
    } = &args.command
    {
        let mut config = settings::load_config(store.as_ref());
        if !feeds.is_empty() {
            config.feed_urls = feeds.clone();
        }
        if !keywords.is_empty() {
            config.filter_keywords = keywords.clone();
        }
        if let Some(interval) = interval {
            config.update_interval_secs = *interval;
        }
        if let Some(dir) = output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(enabled) = schedule {
            config.schedule_enabled = *enabled;
        }
        let saved = settings::save_config(store.as_ref(), config)?;
        print_config(&saved);
        return Ok(());
    }

    let fetcher = HttpFetcher::new().context("cannot build the HTTP client")?;
    let service = Arc::new(
        UpdateService::new(store, Arc::new(fetcher), Arc::new(NoopCache))
            .with_templates(args.template_head, args.template_tail),
    );

    match args.command {
        Command::Run => {
            let summary = service.run_update()?;
            info!(
                "run complete: {} links, {} nodes, {} filtered, {} duplicates, {} failed",
                summary.links, summary.nodes, summary.filtered, summary.duplicates, summary.failed
            );
        }
        Command::Check => {
            let summary = service.run_validate()?;
            info!(
                "check complete: {} links, {} nodes, {} filtered, {} duplicates, {} failed",
                summary.links, summary.nodes, summary.filtered, summary.duplicates, summary.failed
            );
        }
        Command::Watch => {
            service.start_schedule();
            loop {
                std::thread::sleep(Duration::from_secs(60));
            }
        }
        Command::Status => {
            let status = service.status();
            println!("running:         {}", status.running);
            println!("schedule active: {}", status.schedule_active);
            println!(
                "last update:     {}",
                status.last_update.as_deref().unwrap_or("never")
            );
            println!(
                "next update:     {}",
                status.next_update.as_deref().unwrap_or("none")
            );
            let config = settings::load_config(service.store().as_ref());
            let files = service.generated_files(&config);
            for info in [&files.raw_link, &files.clash] {
                if info.exists {
                    println!(
                        "artifact {} ({} bytes, modified {})",
                        info.path.display(),
                        info.size,
                        info.modified.as_deref().unwrap_or("unknown")
                    );
                } else {
                    println!("artifact {} (missing)", info.path.display());
                }
            }
        }
        Command::Logs { limit } => {
            for entry in service.logs(limit) {
                println!("{} [{:?}] {}", entry.timestamp, entry.level, entry.message);
            }
        }
        Command::Configure { .. } => unreachable!(),
    }
    Ok(())
}

fn print_config(config: &SourceConfig) {
    println!("feeds:");
    for url in &config.feed_urls {
        println!("  - {}", url);
    }
    println!("keywords:  {}", config.filter_keywords.join(", "));
    println!("interval:  {}s", config.update_interval_secs);
    println!("output:    {}", config.output_dir);
    println!("schedule:  {}", config.schedule_enabled);
}
