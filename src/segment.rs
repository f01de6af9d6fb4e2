//! Tiered structure-aware text segmenter.
//!
//! Splits one logical block of text into pieces no larger than a configured
//! character budget, preferring natural boundaries over arbitrary cuts.
//! Tiers are attempted in order, each only when the previous tier's unit is
//! still too large:
//!
//! 1. whole block (`section`)
//! 2. paragraphs on blank lines (`paragraph`)
//! 3. sentences on `.`/`?`/`!` + whitespace (`sentence`)
//! 4. fixed character slices with overlap (`fragment`)
//!
//! All functions are pure; sizes are measured in characters, not bytes.

use crate::models::ChunkType;

/// Overlap carried between consecutive fixed-slice fragments.
pub const DEFAULT_FRAGMENT_OVERLAP: usize = 50;

/// Split a block of text into `(text, chunk_type)` pieces.
///
/// The block is expected to already be scoped to a single heading section;
/// heading bookkeeping is the assembler's job. Empty or whitespace-only
/// input yields no pieces.
pub fn split_block(text: &str, max_chunk_size: usize, overlap: usize) -> Vec<(String, ChunkType)> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if char_len(text) <= max_chunk_size {
        return vec![(text.to_string(), ChunkType::Section)];
    }

    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.len() > 1 {
        return accumulate(
            &paragraphs,
            "\n\n",
            max_chunk_size,
            ChunkType::Paragraph,
            |unit| split_sentence_tier(unit, max_chunk_size, overlap),
        );
    }

    split_sentence_tier(text, max_chunk_size, overlap)
}

/// Sentence tier: split on sentence boundaries and accumulate greedily.
/// A lone sentence that still exceeds the limit falls through to the
/// fixed-fragment tier.
fn split_sentence_tier(
    text: &str,
    max_chunk_size: usize,
    overlap: usize,
) -> Vec<(String, ChunkType)> {
    let sentences = split_sentences(text);

    if sentences.len() > 1 {
        let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
        return accumulate(&refs, " ", max_chunk_size, ChunkType::Sentence, |unit| {
            fragment_pieces(unit, max_chunk_size, overlap)
        });
    }

    fragment_pieces(text, max_chunk_size, overlap)
}

/// Greedily pack `units` into buffers of at most `max` characters, flushing
/// each full buffer as a chunk of `flush_type`. Units that are individually
/// oversized are handed to `split_oversized` instead of being buffered.
fn accumulate<F>(
    units: &[&str],
    sep: &str,
    max: usize,
    flush_type: ChunkType,
    split_oversized: F,
) -> Vec<(String, ChunkType)>
where
    F: Fn(&str) -> Vec<(String, ChunkType)>,
{
    let sep_len = char_len(sep);
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for unit in units {
        let unit_len = char_len(unit);

        if unit_len > max {
            if !buf.is_empty() {
                out.push((std::mem::take(&mut buf), flush_type));
                buf_len = 0;
            }
            out.extend(split_oversized(unit));
            continue;
        }

        let would_be = if buf.is_empty() {
            unit_len
        } else {
            buf_len + sep_len + unit_len
        };

        if would_be > max && !buf.is_empty() {
            out.push((std::mem::take(&mut buf), flush_type));
            buf_len = 0;
        }

        if !buf.is_empty() {
            buf.push_str(sep);
            buf_len += sep_len;
        }
        buf.push_str(unit);
        buf_len += unit_len;
    }

    if !buf.is_empty() {
        out.push((buf, flush_type));
    }

    out
}

/// Split text into sentences on `.`, `?`, `!` followed by whitespace.
///
/// The trailing punctuation stays with its sentence. `e.g.` and `i.e.`
/// (case-insensitive) never end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut buf = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        buf.push(c);

        if matches!(c, '.' | '?' | '!') {
            let at_boundary = match chars.peek() {
                Some(next) => next.is_whitespace(),
                None => false,
            };

            if at_boundary && !ends_with_abbreviation(&buf) {
                let sentence = buf.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                buf.clear();
                while let Some(w) = chars.peek() {
                    if w.is_whitespace() {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
        }
    }

    let tail = buf.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// True when the buffer (which ends with the candidate punctuation)
/// terminates in `e.g.` or `i.e.`.
fn ends_with_abbreviation(buf: &str) -> bool {
    let tail: String = buf
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let tail = tail.to_lowercase();
    tail.ends_with("e.g.") || tail.ends_with("i.e.")
}

/// Last-resort fixed slicer: character windows of `max` with `overlap`
/// characters carried between consecutive slices. No semantic awareness.
fn fragment_pieces(text: &str, max: usize, overlap: usize) -> Vec<(String, ChunkType)> {
    split_fixed(text, max, overlap)
        .into_iter()
        .map(|s| (s, ChunkType::Fragment))
        .collect()
}

/// Slice `text` into character windows of at most `max`, stepping by
/// `max - overlap` so adjacent windows share context. Empty input yields
/// nothing, not one empty slice.
pub fn split_fixed(text: &str, max: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    if chars.is_empty() || max == 0 {
        return Vec::new();
    }

    let step = if overlap >= max { max } else { max - overlap };
    let mut out = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + max).min(chars.len());
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            out.push(piece);
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }

    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_block_is_one_section() {
        let pieces = split_block("Hello, world!", 500, DEFAULT_FRAGMENT_OVERLAP);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].0, "Hello, world!");
        assert_eq!(pieces[0].1, ChunkType::Section);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(split_block("", 500, 50).is_empty());
        assert!(split_block("   \n\n  ", 500, 50).is_empty());
        assert!(split_fixed("", 500, 50).is_empty());
    }

    #[test]
    fn test_paragraph_tier_flushes_at_limit() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let pieces = split_block(text, 50, 10);
        assert!(pieces.len() > 1);
        for (text, ct) in &pieces {
            assert_eq!(*ct, ChunkType::Paragraph);
            assert!(text.chars().count() <= 50);
        }
        // Nothing lost across the flushes
        let joined: String = pieces.iter().map(|(t, _)| t.as_str()).collect();
        assert!(joined.contains("First paragraph"));
        assert!(joined.contains("Third paragraph"));
    }

    #[test]
    fn test_single_long_paragraph_splits_into_sentences() {
        let text = "One short sentence. Another short sentence. And a third one here. Plus a fourth sentence.";
        let pieces = split_block(text, 50, 10);
        assert!(pieces.len() > 1);
        for (_, ct) in &pieces {
            assert_eq!(*ct, ChunkType::Sentence);
        }
    }

    #[test]
    fn test_abbreviations_do_not_split() {
        let sentences = split_sentences("Use a queue, e.g. a ring buffer. Then drain it.");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "Use a queue, e.g. a ring buffer.");

        let sentences = split_sentences("Prefer simple types, i.e. plain structs. They serialize.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].starts_with("Prefer"));
    }

    #[test]
    fn test_abbreviation_case_insensitive() {
        let sentences = split_sentences("See the docs, E.g. the intro page. It helps.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_question_and_bang_boundaries() {
        let sentences = split_sentences("Does it work? Yes! It does.");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "Does it work?");
        assert_eq!(sentences[1], "Yes!");
    }

    #[test]
    fn test_giant_word_falls_to_fragments() {
        // 3000 chars, no sentence or paragraph boundaries anywhere.
        let text = "x".repeat(3000);
        let pieces = split_block(&text, 500, 50);
        assert!(pieces.len() > 1);
        for (text, ct) in &pieces {
            assert_eq!(*ct, ChunkType::Fragment);
            assert!(text.chars().count() <= 500);
        }
    }

    #[test]
    fn test_fragment_overlap_carries_context() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let slices = split_fixed(&text, 400, 50);
        assert!(slices.len() >= 2);
        // Each slice after the first starts with the tail of its predecessor.
        let first_tail: String = slices[0].chars().skip(400 - 50).collect();
        assert!(slices[1].starts_with(&first_tail));
    }

    #[test]
    fn test_fragment_overlap_ge_max_still_terminates() {
        let text = "y".repeat(100);
        let slices = split_fixed(&text, 10, 10);
        assert_eq!(slices.len(), 10);
    }

    #[test]
    fn test_oversized_paragraph_among_small_ones() {
        let big = "word ".repeat(60); // ~300 chars, no sentence enders
        let text = format!("Small one.\n\n{}\n\nSmall two.", big.trim());
        let pieces = split_block(&text, 100, 20);
        assert!(pieces
            .iter()
            .any(|(_, ct)| *ct == ChunkType::Fragment || *ct == ChunkType::Sentence));
        assert!(pieces.iter().any(|(t, _)| t.contains("Small one.")));
        assert!(pieces.iter().any(|(t, _)| t.contains("Small two.")));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma.\n\nDelta epsilon zeta.\n\nEta theta iota.";
        let a = split_block(text, 30, 5);
        let b = split_block(text, 30, 5);
        assert_eq!(a, b);
    }
}
