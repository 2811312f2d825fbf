//! # Tech Insight
//!
//! Command-line front end for the tech news pipeline.
//!
//! ## Usage
//!
//! ```sh
//! tech_insight news
//! tech_insight links --page 2
//! tech_insight papers "neural networks" --search-type title
//! tech_insight summarize https://example.com/post
//! tech_insight explain "webassembly" --mode timeline --bookmark
//! tech_insight bookmarks list
//! ```
//!
//! Results are printed as Markdown. With `--json-output-dir` they are also
//! written to `{dir}/{date}/{source}.json`.

use clap::Parser;
use std::error::Error;
use tech_insight::bookmarks::{BookmarkStore, JsonFileStorage};
use tech_insight::config::Config;
use tech_insight::error::BookmarkError;
use tech_insight::facets;
use tech_insight::llm::{ExplainParams, Llm};
use tech_insight::models::{FetchOutcome, FetchParams, SourceKind};
use tech_insight::outputs::{json, markdown};
use tech_insight::service::Aggregator;
use tech_insight::utils::ensure_writable_dir;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{BookmarkAction, Cli, Command};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("tech_insight starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Could not load configuration");
            return Err(e.into());
        }
    };

    // Early check: ensure JSON output dir is writable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir,
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let needs_llm = matches!(args.command, Command::Summarize { .. } | Command::Explain { .. });
    let llm = if needs_llm {
        Llm::load(&config.llm).await
    } else {
        Llm::Unavailable
    };
    let aggregator = Aggregator::new(config, llm);

    let res = run(&args, &aggregator).await;
    let elapsed = start_time.elapsed();
    match &res {
        Ok(()) => info!(?elapsed, "Execution complete"),
        Err(e) => error!(?elapsed, error = %e, "Execution failed"),
    }
    res
}

async fn run(args: &Cli, aggregator: &Aggregator<Llm>) -> Result<(), Box<dyn Error>> {
    let json_dir = args.json_output_dir.as_deref();
    match &args.command {
        Command::News {
            category,
            topic,
            facets: show_facets,
        } => {
            let outcome = aggregator.fetch(SourceKind::News, &FetchParams::default()).await;
            save(json_dir, &outcome, SourceKind::News.as_str()).await;
            if *show_facets {
                println!("Categories: {}", facets::categories(&outcome.items).join(", "));
                println!("Topics: {}", facets::topics(&outcome.items).join(", "));
                return Ok(());
            }
            let filtered = FetchOutcome {
                items: facets::filter_items(&outcome.items, category.as_deref(), topic.as_deref())
                    .into_iter()
                    .cloned()
                    .collect(),
                ..outcome
            };
            print!("{}", markdown::outcome_to_markdown("Latest tech news", &filtered));
        }
        Command::Links { page } => {
            let links = aggregator.links_page(page.saturating_sub(1)).await;
            save(json_dir, &links, SourceKind::LinkAggregator.as_str()).await;
            print!("{}", markdown::links_page_to_markdown(&links));
        }
        Command::Papers {
            query,
            search_type,
            max_results,
        } => {
            let max_results = max_results.unwrap_or(aggregator.config().papers.max_results);
            let outcome = match query.as_deref().filter(|q| !q.trim().is_empty()) {
                Some(q) => aggregator.search_papers(q, (*search_type).into(), max_results).await,
                None => aggregator.recent_papers(max_results).await,
            };
            save(json_dir, &outcome, SourceKind::Paper.as_str()).await;
            let heading = match query {
                Some(q) => format!("Papers matching \"{q}\""),
                None => "Recent papers".to_string(),
            };
            print!("{}", markdown::ranked_to_markdown(&heading, &outcome));
        }
        Command::Summarize { url } => match aggregator.summarize_url(url).await {
            Ok(Some(summary)) => println!("{summary}"),
            Ok(None) => println!("No readable content at {url}"),
            Err(e) => {
                error!(%url, error = %e, "Could not fetch page");
                return Err(e.into());
            }
        },
        Command::Explain {
            topic,
            mode,
            engagement,
            length,
            bookmark,
        } => {
            let params = ExplainParams::new(*engagement, *length, (*mode).into());
            let context = aggregator.explain_context(topic).await;
            let item = aggregator.explain(topic, &context, &params).await?;
            save(json_dir, &item, &format!("generated-{}", tech_insight::utils::slugify_title(topic))).await;
            println!("# {}\n\n{}", item.title, item.content);
            if *bookmark {
                let mut store = open_store(&args.bookmarks_file).await?;
                match store.add(item).await {
                    Ok(b) => println!("\nBookmarked {}", b.url()),
                    Err(BookmarkError::AlreadyExists { url }) => println!("\nAlready bookmarked: {url}"),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Command::Bookmarks { action } => bookmarks(args, aggregator, action).await?,
    }
    Ok(())
}

async fn open_store(path: &str) -> Result<BookmarkStore<JsonFileStorage>, BookmarkError> {
    BookmarkStore::open(JsonFileStorage::new(path)).await
}

#[instrument(level = "info", skip(args, aggregator))]
async fn bookmarks(args: &Cli, aggregator: &Aggregator<Llm>, action: &BookmarkAction) -> Result<(), Box<dyn Error>> {
    let mut store = open_store(&args.bookmarks_file).await?;
    match action {
        BookmarkAction::List => {
            let groups = store.list_grouped_by_type();
            save(args.json_output_dir.as_deref(), &groups, "bookmarks").await;
            print!("{}", markdown::bookmarks_to_markdown(&groups));
        }
        BookmarkAction::Add {
            url,
            from,
            query,
            search_type,
        } => {
            let source = SourceKind::from(*from);
            let max_results = aggregator.config().papers.max_results;
            let outcome = match (source, query) {
                (SourceKind::Paper, Some(q)) => aggregator.search_papers(q, (*search_type).into(), max_results).await,
                (SourceKind::Paper, None) => aggregator.recent_papers(max_results).await,
                _ => aggregator.fetch(source, &FetchParams::default()).await,
            };
            let Some(item) = outcome.items.into_iter().find(|i| i.url == *url) else {
                warn!(%url, %source, "Item not found in current results");
                return Err(format!("{url} is not in the current {source} results").into());
            };
            match store.add(item).await {
                Ok(b) => println!("Bookmarked {}", b.url()),
                Err(BookmarkError::AlreadyExists { url }) => println!("Already bookmarked: {url}"),
                Err(e) => return Err(e.into()),
            }
        }
        BookmarkAction::Remove { url } => {
            if store.remove(url).await? {
                println!("Removed {url}");
            } else {
                println!("No bookmark for {url}");
            }
        }
        BookmarkAction::Clear => {
            store.clear_all().await?;
            println!("Cleared all bookmarks");
        }
    }
    Ok(())
}

/// Write a JSON snapshot if an output directory was given. Failures are logged
/// and do not abort the command.
async fn save<T: serde::Serialize>(json_dir: Option<&str>, value: &T, name: &str) {
    let Some(dir) = json_dir else {
        return;
    };
    if let Err(e) = json::write_snapshot(value, dir, name).await {
        error!(error = %e, name, "Failed to write JSON snapshot");
    }
}
