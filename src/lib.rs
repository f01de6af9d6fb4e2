//! # mdvault
//!
//! A local-first indexing and hybrid search engine for markdown note vaults.
//!
//! mdvault turns a directory of markdown notes (an Obsidian-style vault)
//! into a queryable SQLite index: notes are split into structure-aware
//! chunks along heading, paragraph, and sentence boundaries, optionally
//! embedded, and exposed through keyword, semantic, and hybrid search.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │    Vault     │──▶│   Pipeline    │──▶│  SQLite    │
//! │  *.md files  │   │ Chunk+Embed  │   │ chunks+vec │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                                            ▼
//!                                      ┌──────────┐
//!                                      │   CLI    │
//!                                      │  (mdv)   │
//!                                      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mdv init                          # create database
//! mdv index                         # index the vault (incremental)
//! mdv index --full                  # re-index everything
//! mdv search "meeting notes"        # hybrid search
//! mdv search "rrf" --mode keyword   # keyword only, no embeddings needed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`frontmatter`] | YAML frontmatter extraction and formatting |
//! | [`segment`] | Tiered text segmentation |
//! | [`assemble`] | Document-to-chunk assembly |
//! | [`store`] | Persistent index store |
//! | [`index_vault`] | Vault indexing pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Keyword, semantic, and hybrid search |
//! | [`migrate`] | Schema migrations |

pub mod assemble;
pub mod config;
pub mod embedding;
pub mod frontmatter;
pub mod index_vault;
pub mod migrate;
pub mod models;
pub mod search;
pub mod segment;
pub mod store;
