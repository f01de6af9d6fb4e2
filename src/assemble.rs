//! Chunk assembly: one note in, an ordered chunk list out.
//!
//! Combines the frontmatter formatter and the text segmenter. The body is
//! first cut into heading-scoped sections by a line scanner that tracks
//! fenced code blocks (headings inside fences are inert), then each section
//! is segmented within the size budget. When frontmatter survives
//! formatting, its pseudo-chunk is always `chunks[0]` — callers rely on
//! that ordering.

use serde_yaml::Mapping;

use crate::frontmatter::{format_frontmatter, split_frontmatter};
use crate::models::{Chunk, ChunkType, FRONTMATTER_HEADING, TOP_LEVEL_HEADING};
use crate::segment::split_block;

/// Produce the final ordered chunk list for one note.
///
/// `raw_text` is the full note including any frontmatter block (it is
/// stripped here); `frontmatter` is the already-parsed mapping supplied by
/// the vault scanner (empty when the note has none).
pub fn chunk_document(
    raw_text: &str,
    frontmatter: &Mapping,
    max_chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    if !frontmatter.is_empty() {
        let formatted = format_frontmatter(frontmatter);
        if !formatted.trim().is_empty() {
            chunks.push(Chunk {
                heading: FRONTMATTER_HEADING.to_string(),
                text: formatted,
                chunk_type: ChunkType::Frontmatter,
            });
        }
    }

    let (_, body) = split_frontmatter(raw_text);

    for (heading, content) in split_sections(body) {
        let top_level = heading == TOP_LEVEL_HEADING;

        let block = if top_level {
            content.trim().to_string()
        } else {
            format!("{}\n{}", heading, content).trim().to_string()
        };
        if block.is_empty() {
            continue;
        }

        for (i, (text, chunk_type)) in split_block(&block, max_chunk_size, overlap)
            .into_iter()
            .enumerate()
        {
            // Later pieces of a split section repeat the heading so each
            // chunk is retrievable standalone.
            let text = if !top_level && i > 0 && !text.starts_with(&heading) {
                format!("{}\n{}", heading, text)
            } else {
                text
            };
            chunks.push(Chunk {
                heading: heading.clone(),
                text,
                chunk_type,
            });
        }
    }

    chunks
}

/// Split a body into ordered (heading, content) sections.
///
/// Headings are `#`-prefixed lines (1–6 hashes followed by a space),
/// recognized only outside fenced code blocks. Content before the first
/// heading is grouped under the `"top-level"` sentinel.
fn split_sections(body: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut heading = TOP_LEVEL_HEADING.to_string();
    let mut content = String::new();
    let mut in_fence = false;

    for line in body.lines() {
        if is_fence_line(line) {
            in_fence = !in_fence;
            content.push_str(line);
            content.push('\n');
            continue;
        }

        if !in_fence && is_heading_line(line) {
            sections.push((
                std::mem::replace(&mut heading, line.trim_end().to_string()),
                std::mem::take(&mut content),
            ));
            continue;
        }

        content.push_str(line);
        content.push('\n');
    }

    sections.push((heading, content));
    sections
}

/// A fence delimiter: a line opening with three or more backticks or tildes
/// (leading indentation allowed).
fn is_fence_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// An ATX heading: 1–6 `#` at the start of the line, followed by a space.
fn is_heading_line(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_frontmatter;

    fn chunk(raw: &str, max: usize) -> Vec<Chunk> {
        let (fm, _) = split_frontmatter(raw);
        let mapping = fm.map(parse_frontmatter).unwrap_or_default();
        chunk_document(raw, &mapping, max, 50)
    }

    #[test]
    fn test_end_to_end_three_chunks() {
        let raw = "---\ntags: [work]\n---\n\n# Intro\n\nHello world.\n\n## Details\n\nLorem ipsum dolor sit amet.";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks.len(), 3);

        assert_eq!(chunks[0].chunk_type, ChunkType::Frontmatter);
        assert_eq!(chunks[0].heading, "frontmatter");
        assert_eq!(chunks[0].text, "tags: work");

        assert_eq!(chunks[1].chunk_type, ChunkType::Section);
        assert_eq!(chunks[1].heading, "# Intro");
        assert!(chunks[1].text.contains("Hello world."));

        assert_eq!(chunks[2].chunk_type, ChunkType::Section);
        assert_eq!(chunks[2].heading, "## Details");
        assert!(chunks[2].text.contains("Lorem ipsum"));
    }

    #[test]
    fn test_frontmatter_chunk_is_always_first() {
        let raw = "---\ntitle: Alpha\n---\nBody before headings.\n\n# One\n\nText.";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks[0].chunk_type, ChunkType::Frontmatter);
        assert_eq!(chunks[1].heading, "top-level");
    }

    #[test]
    fn test_frontmatter_isolation() {
        let raw = "---\ntitle: Alpha\nsecret-key: value\n---\n\n# Body\n\nContent here.";
        let chunks = chunk(raw, 1500);
        for c in chunks.iter().filter(|c| c.chunk_type != ChunkType::Frontmatter) {
            assert!(!c.text.contains("---"));
            assert!(!c.text.contains("secret-key: value"));
        }
    }

    #[test]
    fn test_heading_inside_fence_is_inert() {
        let raw = "# Real\n\nbefore\n\n```\n# Not a heading\ncode\n```\n\nafter";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "# Real");
        assert!(chunks[0].text.contains("# Not a heading"));
        assert!(chunks[0].text.contains("after"));
    }

    #[test]
    fn test_tilde_fence() {
        let raw = "# Top\n\n~~~\n## nope\n~~~\n\ndone";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "# Top");
    }

    #[test]
    fn test_heading_only_section_kept() {
        let raw = "# Alpha\n\ncontent\n\n# Empty Section\n";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].heading, "# Empty Section");
        assert_eq!(chunks[1].text, "# Empty Section");
    }

    #[test]
    fn test_no_frontmatter_no_headings() {
        let chunks = chunk("Just a plain note body.", 1500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "top-level");
        assert_eq!(chunks[0].chunk_type, ChunkType::Section);
    }

    #[test]
    fn test_empty_document() {
        assert!(chunk("", 1500).is_empty());
        assert!(chunk("   \n\n  ", 1500).is_empty());
    }

    #[test]
    fn test_split_section_repeats_heading() {
        let para = "Sentence one of many words here.".to_string();
        let body = format!("# Long\n\n{}\n\n{}\n\n{}", para, para, para);
        let chunks = chunk(&body, 60);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert_eq!(c.heading, "# Long");
            assert!(c.text.contains("# Long"), "chunk missing heading: {:?}", c);
        }
    }

    #[test]
    fn test_seven_hashes_not_a_heading() {
        let raw = "####### too deep\n\ntext";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading, "top-level");
    }

    #[test]
    fn test_hash_without_space_not_a_heading() {
        let raw = "#tag in text\n\nmore";
        let chunks = chunk(raw, 1500);
        assert_eq!(chunks[0].heading, "top-level");
    }
}
