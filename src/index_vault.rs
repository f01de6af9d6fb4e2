//! Vault indexing pipeline.
//!
//! Keeps the index store consistent with the vault's current file set:
//! scans for markdown files, re-chunks those modified since the last run,
//! replaces their stored chunks, prunes entries whose source file is gone,
//! and advances the last-run marker.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::assemble::chunk_document;
use crate::config::Config;
use crate::frontmatter::{parse_frontmatter, split_frontmatter};
use crate::models::NoteFile;
use crate::store::IndexStore;

/// Tooling directories never indexed, at any path depth.
const DEFAULT_EXCLUDED_DIRS: &[&str] = &[".git", ".obsidian", ".trash", ".mdvault", "node_modules"];

const PROGRESS_EVERY: usize = 100;

/// Run one indexing pass. `full` ignores the last-run marker and
/// re-indexes everything.
pub async fn run_index(config: &Config, store: &IndexStore, full: bool) -> Result<()> {
    // The marker records when this scan began, not when it finished, so a
    // file modified mid-run is picked up again next time.
    let started = chrono::Utc::now().timestamp();
    let cutoff = if full { 0 } else { last_run_timestamp(config) };

    let files = scan_vault(config)?;
    let valid: HashSet<&str> = files.iter().map(|f| f.relative.as_str()).collect();

    let mut indexed = 0usize;

    for file in &files {
        if file.modified <= cutoff {
            continue;
        }

        // One unreadable file must not abort the run.
        let raw = match std::fs::read_to_string(&file.path) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", file.path.display(), e);
                continue;
            }
        };

        let frontmatter = split_frontmatter(&raw)
            .0
            .map(parse_frontmatter)
            .unwrap_or_default();
        let chunks = chunk_document(
            &raw,
            &frontmatter,
            config.chunking.max_chunk_size,
            config.chunking.fragment_overlap,
        );

        store.replace_chunks(&file.relative, &chunks).await?;
        indexed += 1;

        if indexed % PROGRESS_EVERY == 0 {
            println!("  indexed {} files...", indexed);
        }
    }

    // Prune entries whose source file no longer exists (deletions, renames).
    let stale: Vec<String> = store
        .list_sources()
        .await?
        .into_iter()
        .filter(|s| !valid.contains(s.as_str()))
        .collect();
    let pruned = if stale.is_empty() {
        0
    } else {
        store.delete_sources(&stale).await?
    };

    write_last_run_marker(config, started)?;

    let total = store.count_chunks().await?;
    println!("index vault");
    println!("  files indexed: {}", indexed);
    println!("  entries pruned: {}", pruned);
    println!("  total entries: {}", total);
    println!("ok");

    Ok(())
}

/// Enumerate markdown files under the vault root, excluding tooling
/// directories at any depth. Sorted by relative path for deterministic
/// processing order.
pub fn scan_vault(config: &Config) -> Result<Vec<NoteFile>> {
    let root = &config.vault.root;
    if !root.exists() {
        bail!("Vault root does not exist: {}", root.display());
    }

    let include_set = build_globset(&["**/*.md".to_string()])?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDED_DIRS
        .iter()
        .map(|d| format!("**/{}/**", d))
        .collect();
    excludes.extend(
        config
            .vault
            .exclude_dirs
            .iter()
            .map(|d| format!("**/{}/**", d)),
    );
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        // A bad directory entry (unreadable subdirectory, file removed
        // mid-walk) must not abort the scan.
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Warning: skipping vault entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let modified = metadata
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH)
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        files.push(NoteFile {
            path: path.to_path_buf(),
            relative: rel_str,
            modified,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// The last-run marker lives beside the database; its content is the
/// incremental cutoff as a unix timestamp. Absence or unparseable content
/// means "never indexed" (epoch 0).
fn marker_path(config: &Config) -> PathBuf {
    match config.db.path.parent() {
        Some(parent) => parent.join("last_indexed"),
        None => PathBuf::from("last_indexed"),
    }
}

fn last_run_timestamp(config: &Config) -> i64 {
    std::fs::read_to_string(marker_path(config))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// Written only after a fully successful pass, with the timestamp taken at
/// scan start.
fn write_last_run_marker(config: &Config, timestamp: i64) -> Result<()> {
    let path = marker_path(config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, format!("{}\n", timestamp))?;
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
