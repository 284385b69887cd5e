//! Line-preserving text splitter.
//!
//! Lines are merged greedily into chunks of at most `chunk_size` characters
//! with no overlap. A line is only cut when it alone exceeds the limit.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A source document handed to the index builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Value,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: Value) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded slice of document text ready for embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChunk {
    pub text: String,
    pub metadata: Value,
}

/// Split `text` into chunks of at most `chunk_size` characters.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let line_len = line.chars().count();

        if line_len > chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            chunks.extend(hard_split(line, chunk_size));
            continue;
        }

        if current.is_empty() {
            current.push_str(line);
            current_len = line_len;
        } else if current_len + 1 + line_len <= chunk_size {
            current.push('\n');
            current.push_str(line);
            current_len += 1 + line_len;
        } else {
            chunks.push(std::mem::replace(&mut current, line.to_string()));
            current_len = line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Cut a single over-long line at character boundaries.
fn hard_split(line: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Split every document, carrying its metadata onto each chunk.
pub fn chunk_documents(documents: &[Document], chunk_size: usize) -> Vec<IndexChunk> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, chunk_size)
                .into_iter()
                .map(|text| IndexChunk {
                    text,
                    metadata: doc.metadata.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merges_lines_up_to_limit() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_text(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_text(text, 100), vec!["aaaa\nbbbb\ncccc"]);
    }

    #[test]
    fn test_never_exceeds_limit_and_keeps_all_text() {
        let line = "2024-06-01T10:00:00Z | SRC: 10.0.0.4:44321 → DST: 52.1.1.1:443 | T | Outbound | Allowed";
        let text = vec![line; 40].join("\n");
        let chunks = split_text(&text, 512);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 512);
        }
        let total_lines: usize = chunks.iter().map(|c| c.lines().count()).sum();
        assert_eq!(total_lines, 40);
    }

    #[test]
    fn test_long_line_is_hard_split_on_char_boundaries() {
        let line = "é".repeat(25);
        let chunks = split_text(&line, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_long_line_flushes_pending_chunk() {
        let text = format!("short\n{}\ntail", "x".repeat(12));
        assert_eq!(split_text(&text, 10), vec!["short", "xxxxxxxxxx", "xx", "tail"]);
    }

    #[test]
    fn test_blank_input() {
        assert!(split_text("", 512).is_empty());
        assert!(split_text("\n \n", 512).is_empty());
    }

    #[test]
    fn test_chunk_documents_carries_metadata() {
        let docs = vec![
            Document::new("one\ntwo", json!({"kind": "flows"})),
            Document::new("preview", json!({"kind": "preview"})),
        ];
        let chunks = chunk_documents(&docs, 512);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one\ntwo");
        assert_eq!(chunks[0].metadata["kind"], "flows");
        assert_eq!(chunks[1].metadata["kind"], "preview");
    }
}
