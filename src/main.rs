//! seo-audit main entry point
//!
//! This is the command-line interface for the seo-audit pipeline.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use seo_audit::config::{load_config_with_hash, Config};
use seo_audit::output::{
    load_page_statistics, print_audit_summary, print_cache_entries, write_json,
    write_markdown_report,
};
use seo_audit::{AuditRequest, Auditor, Language};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// seo-audit: a polite, bounded SEO audit of one website
///
/// Crawls a site within page and depth limits, respecting robots.txt and
/// per-host rate limits, then scores its technical, on-page and text SEO
/// and lists the issues worth fixing first.
#[derive(Parser, Debug)]
#[command(name = "seo-audit")]
#[command(version)]
#[command(about = "A polite, bounded SEO auditor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Audit a website
    Audit {
        /// Root URL of the site
        url: String,

        /// Maximum number of pages to parse (1-1000)
        #[arg(long, default_value_t = seo_audit::audit::DEFAULT_MAX_PAGES)]
        max_pages: u32,

        /// Maximum link depth from the root (1-10)
        #[arg(long, default_value_t = seo_audit::audit::DEFAULT_MAX_DEPTH)]
        max_depth: u32,

        /// Text language
        #[arg(long, value_enum, default_value_t = Language::Auto)]
        language: Language,

        /// Ignore any cached result
        #[arg(long)]
        force_refresh: bool,

        /// Write a markdown report to this path
        #[arg(long, value_name = "PATH")]
        markdown: Option<PathBuf>,

        /// Write the full result as JSON to this path
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },

    /// Inspect or maintain the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// List cached results and failures
    List,
    /// Remove every cache entry
    Clear,
    /// Remove expired cache entries
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let auditor = Auditor::from_config(config).context("failed to open the audit database")?;

    match cli.command {
        Command::Audit {
            url,
            max_pages,
            max_depth,
            language,
            force_refresh,
            markdown,
            json,
        } => {
            let request = AuditRequest::new(url)
                .max_pages(max_pages)
                .max_depth(max_depth)
                .language(language)
                .force_refresh(force_refresh);
            handle_audit(&auditor, request, markdown, json).await
        }
        Command::Cache { action } => handle_cache(&auditor, action),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_audit=info,warn"),
            1 => EnvFilter::new("seo_audit=debug,info"),
            2 => EnvFilter::new("seo_audit=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs one audit; Ctrl-C cancels it
async fn handle_audit(
    auditor: &Auditor,
    request: AuditRequest,
    markdown: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling the audit");
            on_interrupt.cancel();
        }
    });

    let outcome = auditor
        .run(request, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("audit failed ({}): {}", e.kind().as_str(), e))?;

    let pages = if outcome.from_cache {
        None
    } else {
        let storage = auditor
            .storage()
            .lock()
            .map_err(|_| anyhow::anyhow!("storage lock poisoned"))?;
        Some(load_page_statistics(&*storage, outcome.result.website.id)?)
    };
    print_audit_summary(&outcome, pages.as_ref());

    if let Some(path) = markdown {
        write_markdown_report(&outcome.result, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("\nMarkdown report written to: {}", path.display());
    }
    if let Some(path) = json {
        write_json(&outcome.result, &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("JSON report written to: {}", path.display());
    }

    Ok(())
}

fn handle_cache(auditor: &Auditor, action: CacheAction) -> anyhow::Result<()> {
    let cache = auditor.cache();
    match action {
        CacheAction::List => {
            let entries = cache.list().context("failed to read the cache")?;
            print_cache_entries(&entries, Utc::now());
        }
        CacheAction::Clear => {
            let removed = cache.clear().context("failed to clear the cache")?;
            println!("Removed {} cache entries", removed);
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired().context("failed to purge the cache")?;
            println!("Removed {} expired cache entries", removed);
        }
    }
    Ok(())
}
