//! Core data models used throughout mdvault.
//!
//! These types represent the chunks, stored index entries, and search
//! results that flow through the indexing and retrieval pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sha2::{Digest, Sha256};

/// Sentinel heading for body text that precedes the first markdown heading.
pub const TOP_LEVEL_HEADING: &str = "top-level";

/// Sentinel heading for the frontmatter pseudo-chunk.
pub const FRONTMATTER_HEADING: &str = "frontmatter";

/// Which splitting tier produced a chunk.
///
/// Closed set — stored as text in SQLite and parsed back with [`FromStr`];
/// an unrecognized stored value is a hard error, not a silent new category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Formatted frontmatter metadata, always the first chunk when present.
    Frontmatter,
    /// A whole heading section that fit within the size limit.
    Section,
    /// Accumulated paragraphs flushed at the size limit.
    Paragraph,
    /// Accumulated sentences flushed at the size limit.
    Sentence,
    /// Fixed-size character slice with overlap; last-resort splitter.
    Fragment,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Frontmatter => "frontmatter",
            ChunkType::Section => "section",
            ChunkType::Paragraph => "paragraph",
            ChunkType::Sentence => "sentence",
            ChunkType::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontmatter" => Ok(ChunkType::Frontmatter),
            "section" => Ok(ChunkType::Section),
            "paragraph" => Ok(ChunkType::Paragraph),
            "sentence" => Ok(ChunkType::Sentence),
            "fragment" => Ok(ChunkType::Fragment),
            other => anyhow::bail!("unknown chunk type: '{}'", other),
        }
    }
}

/// One indexable unit of text produced by the chunk assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The structural heading this chunk belongs to, or a sentinel
    /// (`"top-level"`, `"frontmatter"`).
    pub heading: String,
    /// Chunk content, including the heading prefix for non-top-level chunks.
    pub text: String,
    pub chunk_type: ChunkType,
}

/// A persisted index entry, as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    /// Vault-relative path of the source note.
    pub source: String,
    pub ordinal: i64,
    pub heading: String,
    pub chunk_type: ChunkType,
    pub text: String,
}

/// A search result returned to the caller. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub source: String,
    /// Chunk content, possibly truncated to a preview length.
    pub content: String,
    pub heading: String,
}

/// A markdown file discovered by the vault scanner.
#[derive(Debug, Clone)]
pub struct NoteFile {
    pub path: PathBuf,
    /// Path relative to the vault root; identity of the note in the store.
    pub relative: String,
    /// Last-modified time as a unix timestamp.
    pub modified: i64,
}

/// Deterministic chunk id derived from (source path, ordinal).
///
/// Re-indexing the same document yields the same ids, so a full replace
/// never drifts or duplicates.
pub fn chunk_id(source: &str, ordinal: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\n");
    hasher.update(ordinal.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_deterministic() {
        assert_eq!(chunk_id("notes/a.md", 0), chunk_id("notes/a.md", 0));
        assert_ne!(chunk_id("notes/a.md", 0), chunk_id("notes/a.md", 1));
        assert_ne!(chunk_id("notes/a.md", 0), chunk_id("notes/b.md", 0));
    }

    #[test]
    fn test_chunk_type_roundtrip() {
        for ct in [
            ChunkType::Frontmatter,
            ChunkType::Section,
            ChunkType::Paragraph,
            ChunkType::Sentence,
            ChunkType::Fragment,
        ] {
            assert_eq!(ct.as_str().parse::<ChunkType>().unwrap(), ct);
        }
    }

    #[test]
    fn test_chunk_type_unknown_is_error() {
        assert!("blob".parse::<ChunkType>().is_err());
    }
}
