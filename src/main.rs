//! # mdvault CLI (`mdv`)
//!
//! The `mdv` binary is the command-line interface for mdvault. It provides
//! commands for database initialization, vault indexing, and search.
//!
//! ## Usage
//!
//! ```bash
//! mdv --config ./mdvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mdv init` | Create the SQLite database and run schema migrations |
//! | `mdv index` | Index the vault incrementally (or `--full`) |
//! | `mdv search "<query>"` | Search indexed chunks |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! mdv init --config ./mdvault.toml
//!
//! # Incremental index of the vault
//! mdv index --config ./mdvault.toml
//!
//! # Re-index everything from scratch
//! mdv index --full --config ./mdvault.toml
//!
//! # Hybrid search (keyword + semantic)
//! mdv search "quarterly planning" --config ./mdvault.toml
//!
//! # Keyword search, frontmatter chunks only
//! mdv search "tags" --mode keyword --chunk-type frontmatter
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mdvault::{config, index_vault, migrate, search, store::IndexStore};

/// mdvault CLI — a local-first indexing and hybrid search engine for
/// markdown note vaults.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "mdv",
    about = "mdvault — a local-first indexing and hybrid search engine for markdown note vaults",
    version,
    long_about = "mdvault indexes a directory of markdown notes into SQLite: notes are split \
    into structure-aware chunks along heading, paragraph, and sentence boundaries, optionally \
    embedded, and exposed through keyword, semantic, and hybrid search."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./mdvault.toml`. Vault, database, chunking, retrieval,
    /// and embedding settings are read from this file.
    #[arg(long, global = true, default_value = "./mdvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (chunks,
    /// chunk_vectors). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Index the vault.
    ///
    /// Scans the vault for markdown files, chunks those modified since the
    /// last run, and prunes entries whose source file no longer exists.
    /// Runs migrations first, so a fresh database works without `init`.
    Index {
        /// Ignore the last-run marker — re-index all files from scratch.
        #[arg(long)]
        full: bool,
    },

    /// Search indexed chunks.
    ///
    /// Queries the index using the specified search mode and prints ranked
    /// results with source paths and excerpts.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `keyword` (substring), `semantic` (vector), or
        /// `hybrid` (RRF merge). Semantic and hybrid require an embedding
        /// provider to be configured.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Filter results to one chunk category
        /// (frontmatter, section, paragraph, sentence, fragment).
        #[arg(long)]
        chunk_type: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { full } => {
            migrate::run_migrations(&cfg).await?;
            let store = IndexStore::open(&cfg).await?;
            index_vault::run_index(&cfg, &store, full).await?;
            store.close().await;
        }
        Commands::Search {
            query,
            mode,
            chunk_type,
            limit,
        } => {
            search::run_search(&cfg, &query, &mode, chunk_type, limit).await?;
        }
    }

    Ok(())
}
