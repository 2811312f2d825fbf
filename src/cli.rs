//! Command-line interface definitions for Tech Insight.
//!
//! Global options can also come from environment variables.

use clap::{Parser, Subcommand, ValueEnum};
use tech_insight::llm::ExplainMode;
use tech_insight::models::{SearchType, SourceKind};

/// Command-line arguments for the Tech Insight application.
///
/// # Examples
///
/// ```sh
/// # Latest news, filtered to one topic
/// tech_insight news --topic AI
///
/// # Second page of link-aggregator stories, also saved as JSON
/// tech_insight -j ./json links --page 2
///
/// # Title search for papers
/// tech_insight papers "graph neural networks" --search-type title
///
/// # Save a paper from a search
/// tech_insight bookmarks add http://arxiv.org/abs/2505.00001v1 --from papers --query "graph neural" -t title
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "TECH_INSIGHT_CONFIG")]
    pub config: Option<String>,

    /// Also write results as JSON under this directory
    #[arg(short, long, env = "TECH_INSIGHT_JSON_DIR")]
    pub json_output_dir: Option<String>,

    /// Bookmark file
    #[arg(short, long, env = "TECH_INSIGHT_BOOKMARKS", default_value = "bookmarks.json")]
    pub bookmarks_file: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Latest articles from the news site
    News {
        /// Only show this category
        #[arg(long)]
        category: Option<String>,
        /// Only show items tagged with this topic
        #[arg(long)]
        topic: Option<String>,
        /// List available categories and topics instead of items
        #[arg(long)]
        facets: bool,
    },
    /// Front page of the link aggregator
    Links {
        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Search papers, or list the newest ones when no query is given
    Papers {
        query: Option<String>,
        #[arg(short = 't', long, value_enum, default_value_t)]
        search_type: SearchScope,
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// Summarize the text of a web page
    Summarize { url: String },
    /// Generate an explainer or timeline about a topic
    Explain {
        topic: String,
        #[arg(long, value_enum, default_value_t)]
        mode: Mode,
        /// Playfulness, 0-10
        #[arg(long, default_value_t = 5)]
        engagement: u8,
        /// Target length in words, 200-800
        #[arg(long, default_value_t = 500)]
        length: u16,
        /// Bookmark the generated piece
        #[arg(long)]
        bookmark: bool,
    },
    /// Manage saved items
    Bookmarks {
        #[command(subcommand)]
        action: BookmarkAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum BookmarkAction {
    /// Show bookmarks grouped by source
    List,
    /// Bookmark an item by url from a fresh fetch of its source
    Add {
        url: String,
        #[arg(long, value_enum)]
        from: Source,
        /// Paper search query the item was found with
        #[arg(long)]
        query: Option<String>,
        /// Search scope the query was run with
        #[arg(short = 't', long, value_enum, default_value_t)]
        search_type: SearchScope,
    },
    /// Remove one bookmark
    Remove { url: String },
    /// Remove every bookmark
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchScope {
    #[default]
    All,
    Title,
    Abstract,
    Author,
    Category,
}

impl From<SearchScope> for SearchType {
    fn from(s: SearchScope) -> Self {
        match s {
            SearchScope::All => SearchType::All,
            SearchScope::Title => SearchType::Title,
            SearchScope::Abstract => SearchType::Abstract,
            SearchScope::Author => SearchType::Author,
            SearchScope::Category => SearchType::Category,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Explainer,
    Timeline,
}

impl From<Mode> for ExplainMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Explainer => ExplainMode::Explainer,
            Mode::Timeline => ExplainMode::Timeline,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    News,
    Links,
    Papers,
}

impl From<Source> for SourceKind {
    fn from(s: Source) -> Self {
        match s {
            Source::News => SourceKind::News,
            Source::Links => SourceKind::LinkAggregator,
            Source::Papers => SourceKind::Paper,
        }
    }
}
