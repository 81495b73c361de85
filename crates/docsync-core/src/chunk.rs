//! Content splitting and stable chunk identity.
//!
//! Two steps turn a loaded document into index chunks:
//!
//! 1. A [`ContentSplitter`] cuts each page of the document into
//!    [`ContentUnit`]s. The default [`RecursiveSplitter`] tries paragraph,
//!    line and word boundaries in turn, packing pieces up to `chunk_size`
//!    characters with `chunk_overlap` characters carried between neighbours.
//! 2. [`assign_chunk_ids`] gives every unit the identifier
//!    `<source>:<page>:<ordinal>`. The ordinal restarts at 0 whenever the
//!    `(source, page)` pair changes, so re-chunking the same file always
//!    yields the same identifiers. The index uses these to remove and
//!    re-insert a file's chunks idempotently.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::chunk::assign_chunk_ids;
//! use docsync_core::models::ContentUnit;
//!
//! let unit = |page: u32, text: &str| ContentUnit {
//!     source_path: Some("/docs/doc.pdf".into()),
//!     page,
//!     content: text.into(),
//! };
//! let chunks = assign_chunk_ids(vec![unit(3, "a"), unit(3, "b"), unit(4, "c")]);
//! let ids: Vec<_> = chunks.iter().map(|c| c.id.as_str()).collect();
//! assert_eq!(ids, ["/docs/doc.pdf:3:0", "/docs/doc.pdf:3:1", "/docs/doc.pdf:4:0"]);
//! ```

use std::collections::VecDeque;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::{ContentUnit, IndexChunk};

/// Separators tried in order before falling back to a hard character split.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits loaded pages into ordered content units.
pub trait ContentSplitter: Send + Sync {
    /// Split every page, preserving page order and each page's source and
    /// page number on the produced units.
    fn split(&self, pages: &[ContentUnit]) -> Vec<ContentUnit>;
}

/// Character-budget splitter that prefers natural text boundaries.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`; `chunk_size` of 0 is
    /// treated as 1.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split one text into pieces of at most `chunk_size` characters
    /// (a single word longer than that is hard-split).
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some(level) = separators.iter().position(|sep| text.contains(sep)) else {
            return self.hard_split(text);
        };
        let separator = separators[level];
        let rest = &separators[level + 1..];

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in text.split(separator).filter(|p| !p.is_empty()) {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            out.extend(self.split_recursive(piece, rest));
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }
        out
    }

    /// Pack small pieces into chunks, keeping up to `chunk_overlap`
    /// characters of trailing pieces at the start of the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joined_len = |total: usize, window: &VecDeque<&str>| {
                total + len + if window.is_empty() { 0 } else { sep_len }
            };

            if joined_len(total, &window) > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut out, &join(&window, separator));
                while total > self.chunk_overlap
                    || (total > 0 && joined_len(total, &window) > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_trimmed(&mut out, &join(&window, separator));
        }
        out
    }

    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut out = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            push_trimmed(&mut out, &chars[start..end].iter().collect::<String>());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        out
    }
}

impl ContentSplitter for RecursiveSplitter {
    fn split(&self, pages: &[ContentUnit]) -> Vec<ContentUnit> {
        pages
            .iter()
            .flat_map(|page| {
                self.split_text(&page.content)
                    .into_iter()
                    .map(move |content| ContentUnit {
                        source_path: page.source_path.clone(),
                        page: page.page,
                        content,
                    })
            })
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Assign stable `<source>:<page>:<ordinal>` identifiers to an ordered
/// sequence of units from one source file.
///
/// A unit whose declared source is missing or not absolute gets a synthetic
/// source derived from its content, so assignment never fails; such chunks
/// cannot be removed by the file's source key.
pub fn assign_chunk_ids(units: Vec<ContentUnit>) -> Vec<IndexChunk> {
    let mut last_key: Option<(String, u32)> = None;
    let mut ordinal = 0usize;
    let mut chunks = Vec::with_capacity(units.len());

    for unit in units {
        let source = match unit.source_path.as_deref() {
            Some(s) if is_absolute_source(s) => s.to_string(),
            other => {
                tracing::warn!(
                    source = ?other,
                    page = unit.page,
                    "content unit source missing or not absolute, using synthetic source"
                );
                synthetic_source(&unit.content)
            }
        };

        let key = (source, unit.page);
        if last_key.as_ref() == Some(&key) {
            ordinal += 1;
        } else {
            ordinal = 0;
        }
        let (source, page) = &key;

        chunks.push(IndexChunk {
            id: format!("{}:{}:{}", source, page, ordinal),
            source: source.clone(),
            page: *page,
            metadata: serde_json::json!({ "source": source, "page": page }),
            content: unit.content,
            embedding: None,
        });
        last_key = Some(key);
    }

    chunks
}

fn is_absolute_source(source: &str) -> bool {
    source.starts_with('/') || Path::new(source).is_absolute()
}

fn synthetic_source(content: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(content.as_bytes()));
    format!("unknown_source_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(source: Option<&str>, page: u32, text: &str) -> ContentUnit {
        ContentUnit {
            source_path: source.map(str::to_string),
            page,
            content: text.to_string(),
        }
    }

    #[test]
    fn ordinal_increments_within_page_and_resets_on_change() {
        let units = vec![
            unit(Some("/data/doc.pdf"), 3, "one"),
            unit(Some("/data/doc.pdf"), 3, "two"),
            unit(Some("/data/doc.pdf"), 4, "three"),
            unit(Some("/data/doc.pdf"), 3, "four"),
        ];
        let ids: Vec<_> = assign_chunk_ids(units).into_iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec![
                "/data/doc.pdf:3:0",
                "/data/doc.pdf:3:1",
                "/data/doc.pdf:4:0",
                "/data/doc.pdf:3:0",
            ]
        );
    }

    #[test]
    fn identifiers_are_stable_across_runs() {
        let units = || {
            vec![
                unit(Some("/a/b.md"), 0, "alpha"),
                unit(Some("/a/b.md"), 0, "beta"),
                unit(None, 0, "gamma"),
            ]
        };
        let first: Vec<_> = assign_chunk_ids(units()).into_iter().map(|c| c.id).collect();
        let second: Vec<_> = assign_chunk_ids(units()).into_iter().map(|c| c.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn relative_or_missing_source_gets_synthetic_token() {
        let chunks = assign_chunk_ids(vec![
            unit(Some("relative/doc.txt"), 0, "hello"),
            unit(None, 0, "hello"),
        ]);
        assert!(chunks[0].source.starts_with("unknown_source_"));
        assert_eq!(chunks[0].source, chunks[1].source);
        assert_eq!(chunks[0].id, format!("{}:0:0", chunks[0].source));
        assert_eq!(chunks[1].id, format!("{}:0:1", chunks[1].source));
    }

    #[test]
    fn metadata_carries_source_and_page() {
        let chunks = assign_chunk_ids(vec![unit(Some("/x/y.txt"), 2, "body")]);
        assert_eq!(chunks[0].metadata["source"], "/x/y.txt");
        assert_eq!(chunks[0].metadata["page"], 2);
        assert!(chunks[0].embedding.is_none());
    }

    #[test]
    fn small_text_is_one_piece() {
        let splitter = RecursiveSplitter::new(800, 80);
        assert_eq!(splitter.split_text("Hello, world!"), vec!["Hello, world!"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let splitter = RecursiveSplitter::new(800, 80);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("  \n\n  ").is_empty());
    }

    #[test]
    fn pieces_respect_chunk_size() {
        let text = (0..60)
            .map(|i| format!("Paragraph number {} has some words in it.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let splitter = RecursiveSplitter::new(120, 20);
        let pieces = splitter.split_text(&text);
        assert!(pieces.len() > 1);
        for p in &pieces {
            assert!(p.chars().count() <= 120, "piece too long: {}", p.len());
        }
        assert!(pieces[0].starts_with("Paragraph number 0"));
    }

    #[test]
    fn consecutive_pieces_overlap() {
        let text = (0..40).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let splitter = RecursiveSplitter::new(30, 10);
        let pieces = splitter.split_text(&text);
        assert!(pieces.len() > 1);
        let last_word = pieces[0].rsplit(' ').next().unwrap();
        assert!(pieces[1].contains(last_word));
    }

    #[test]
    fn long_word_is_hard_split() {
        let text = "x".repeat(25);
        let splitter = RecursiveSplitter::new(10, 0);
        let pieces = splitter.split_text(&text);
        assert_eq!(pieces, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn split_keeps_page_and_source() {
        let splitter = RecursiveSplitter::new(10, 0);
        let pages = vec![
            unit(Some("/d/s.pptx"), 0, "first slide text"),
            unit(Some("/d/s.pptx"), 1, "second"),
        ];
        let units = splitter.split(&pages);
        assert!(units.len() >= 3);
        assert!(units.iter().all(|u| u.source_path.as_deref() == Some("/d/s.pptx")));
        assert_eq!(units.last().unwrap().page, 1);
        assert_eq!(units.last().unwrap().content, "second");
    }

    #[test]
    fn deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let splitter = RecursiveSplitter::new(8, 2);
        assert_eq!(splitter.split_text(text), splitter.split_text(text));
    }
}
