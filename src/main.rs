//! # Bookmarks CLI (`bm`)
//!
//! Adds, searches, and reindexes bookmarks in the local archive.
//!
//! ## Usage
//!
//! ```bash
//! bm --config ./config/bm.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bm init` | Create the SQLite database and run schema migrations |
//! | `bm add <url>... --title <t>...` | Store a bookmark, fetching its content |
//! | `bm get <url>` | Print a stored bookmark |
//! | `bm delete <url>` | Remove a bookmark |
//! | `bm search [query]` | Faceted full-text search |
//! | `bm tags` | List tags with their counts |
//! | `bm reindex <url>` | Re-acquire one bookmark |
//! | `bm reindex --query <q>` | Re-acquire every matching bookmark |
//! | `bm fetch <url>...` | Print the text that would be stored for the URLs |
//!
//! ## Examples
//!
//! ```bash
//! # A single page
//! bm add https://theangrygm.com/some-article/ --title "Some Article" --tag gm-advice
//!
//! # A collection: one title per URL plus a collection title
//! bm add https://a.example/1 https://a.example/2 \
//!     --title "Part 1" --title "Part 2" --collection-title "The Series"
//!
//! # Second page of results as JSON
//! bm search dragons --page 2 --json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bookmarks::reindex::ReindexOptions;
use bookmarks::{acquire, config, db, get, index, migrate, reindex, search};
use bookmarks_core::models::{OneOrMany, Submission};

/// Bookmarks CLI: a personal archive that keeps a searchable full-text
/// snapshot of every bookmarked page.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bm.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bm",
    about = "A personal bookmark archive with full-text search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Store a bookmark.
    ///
    /// Without `--content` the pages are fetched and their text extracted.
    /// Adding a URL that is already stored replaces the stored bookmark.
    Add {
        /// Page URL. Give several for a collection.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Page title, one per URL in the same order.
        #[arg(long = "title", required = true)]
        titles: Vec<String>,

        /// Title of the whole collection. Required with more than one URL.
        #[arg(long)]
        collection_title: Option<String>,

        /// Tag. Repeat for several.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Use this text instead of fetching the pages.
        #[arg(long)]
        content: Option<String>,
    },

    /// Print a stored bookmark.
    Get {
        url: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Delete a bookmark. Deleting a missing bookmark is not an error.
    Delete { url: String },

    /// Search bookmark content.
    Search {
        /// Query. Omit to list every bookmark.
        query: Option<String>,

        /// 1-based result page.
        #[arg(long)]
        page: Option<i64>,

        /// Print the result page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List all tags with their bookmark counts.
    Tags,

    /// Re-acquire the content of stored bookmarks.
    ///
    /// URLs are normalized again; a bookmark whose primary URL changes is
    /// moved to the new key.
    Reindex {
        /// Stored URL of the bookmark.
        #[arg(required_unless_present = "query", conflicts_with = "query")]
        url: Option<String>,

        /// Reindex every bookmark matching this query ("" for all).
        #[arg(long)]
        query: Option<String>,

        /// Use this text instead of fetching the pages.
        #[arg(long, requires = "url")]
        content: Option<String>,

        /// Replacement titles, collection title first.
        #[arg(long = "title", requires = "url")]
        titles: Vec<String>,

        /// Replacement tags.
        #[arg(long = "tag", requires = "url")]
        tags: Vec<String>,
    },

    /// Fetch and print the text of the given URLs without storing it.
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.logging.filter);

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Add {
            urls,
            titles,
            collection_title,
            tags,
            content,
        } => {
            let submission = Submission {
                titles: OneOrMany::from_vec(titles),
                urls: OneOrMany::from_vec(urls),
                collection_title,
                tags,
                content,
                indexed_at: None,
            };
            index::run_add(&cfg, submission).await?;
        }
        Commands::Get { url, json } => {
            get::run_get(&cfg, &url, json).await?;
        }
        Commands::Delete { url } => {
            index::run_delete(&cfg, &url).await?;
        }
        Commands::Search { query, page, json } => {
            search::run_search(&cfg, query.as_deref(), page, json).await?;
        }
        Commands::Tags => {
            search::run_tags(&cfg).await?;
        }
        Commands::Reindex {
            url,
            query,
            content,
            titles,
            tags,
        } => match url {
            Some(url) => {
                let options = ReindexOptions {
                    content,
                    titles: (!titles.is_empty()).then_some(titles),
                    tags: (!tags.is_empty()).then_some(tags),
                };
                reindex::run_reindex(&cfg, &url, options).await?;
            }
            None => {
                reindex::run_reindex_matching(&cfg, query.as_deref()).await?;
            }
        },
        Commands::Fetch { urls } => {
            acquire::run_fetch(&cfg, &urls).await?;
        }
    }

    Ok(())
}
