//! Artifact publishers.
//!
//! A [`Publisher`] persists a finished [`Artifact`] and hands back an
//! [`ArtifactRef`]. [`GoogleDocsPublisher`] uploads to Google Docs in
//! character-bounded insert batches; [`LocalFilePublisher`] writes a markdown
//! file and doubles as the fallback when an upload fails.

pub mod docs;
pub mod local;

pub use docs::{AccessTokens, GoogleDocsPublisher, ServiceAccountTokens, StaticToken, DEFAULT_BATCH_SIZE};
pub use local::LocalFilePublisher;

use crate::error::Result;
use crate::types::{Artifact, ArtifactRef};
use async_trait::async_trait;

/// Persists artifacts somewhere retrievable.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Store `artifact` and return where it can be found.
    async fn publish(&self, artifact: &Artifact) -> Result<ArtifactRef>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// One bounded piece of an artifact body, positioned by character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertChunk {
    /// Offset of the first character within the full body, in `char`s.
    pub offset: usize,
    pub text: String,
}

/// Split `content` into ordered chunks of at most `limit` characters.
///
/// Produces `ceil(len / limit)` chunks whose concatenation is exactly
/// `content`. Boundaries always fall on `char` boundaries. A `limit` of zero
/// is treated as one.
///
/// ```
/// use content_pipeline::publish::chunk_content;
///
/// let chunks = chunk_content("abcdefg", 3);
/// let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, ["abc", "def", "g"]);
/// assert_eq!(chunks[2].offset, 6);
/// ```
pub fn chunk_content(content: &str, limit: usize) -> Vec<InsertChunk> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut offset = 0;
    let mut len = 0;

    for c in content.chars() {
        current.push(c);
        len += 1;
        if len == limit {
            chunks.push(InsertChunk {
                offset,
                text: std::mem::take(&mut current),
            });
            offset += len;
            len = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(InsertChunk {
            offset,
            text: current,
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_and_coverage() {
        let content: String = "abcdefghij".repeat(450); // 4500 chars
        let chunks = chunk_content(&content, 2000);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 2000);
        assert_eq!(chunks[1].offset, 2000);
        assert_eq!(chunks[2].offset, 4000);
        assert_eq!(chunks[2].text.len(), 500);

        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_chunk_exact_multiple() {
        let chunks = chunk_content(&"x".repeat(4000), 2000);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_chunk_empty() {
        assert!(chunk_content("", 2000).is_empty());
    }

    #[test]
    fn test_chunk_multibyte_boundaries() {
        let content = "héllo wörld ✓✓✓";
        let chunks = chunk_content(content, 4);
        let total_chars = content.chars().count();
        assert_eq!(chunks.len(), total_chars.div_ceil(4));
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 4);
        }
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, content);
    }

    #[test]
    fn test_chunk_zero_limit() {
        assert_eq!(chunk_content("ab", 0).len(), 2);
    }
}
