//! Source adapters: turn a video reference or a web page into plain text.
//!
//! ```text
//! video URL ──► resolve_video_id ──► TranscriptSource ──► newline-joined segments ─┐
//!                                                                                    ├─► SourceText ──► enforce_budget ──► BudgetedText
//! page URL ───► PageFetcher ──► extract_paragraphs ──► newline-joined <p> text ─────┘
//! ```
//!
//! Fetching is delegated to the [`TranscriptSource`](video::TranscriptSource)
//! and [`PageFetcher`](web::PageFetcher) collaborators so adapters can be
//! exercised without the network.

pub mod video;
pub mod web;
pub mod youtube;

pub use video::{resolve_video_id, TranscriptSource, VideoSource};
pub use web::{extract_paragraphs, HttpFetcher, PageFetcher, WebSource, NO_CONTENT_FOUND};
pub use youtube::YoutubeTranscripts;

use crate::error::Result;
use crate::tokenizer::Tokenizer;
use crate::types::{BudgetedText, SourceText};
use async_trait::async_trait;
use tracing::{debug, info};

/// A source adapter that produces normalized text from a reference string.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Resolve and fetch `reference`, returning the normalized text.
    async fn acquire(&self, reference: &str) -> Result<SourceText>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Apply the token ceiling to freshly acquired text.
///
/// The text is recounted with `tokenizer`; the count the source adapter
/// attached may come from a different vocabulary. Text within `limit` passes
/// through untouched; longer text is cut to a token prefix of at most `limit`
/// tokens and flagged as truncated.
pub fn enforce_budget(tokenizer: &dyn Tokenizer, source: SourceText, limit: usize) -> BudgetedText {
    let count = tokenizer.count(&source.raw);
    if count <= limit {
        debug!(tokens = count, limit, "source text within budget");
        return BudgetedText {
            text: source.raw,
            token_count: count,
            truncated: false,
            origin: source.origin,
        };
    }

    let text = tokenizer.truncate(&source.raw, limit);
    let token_count = tokenizer.count(&text);
    info!(
        before = count,
        after = token_count,
        limit,
        exact = tokenizer.is_exact(),
        "truncated source text to token budget"
    );
    BudgetedText {
        text,
        token_count,
        truncated: true,
        origin: source.origin,
    }
}

/// Build a [`SourceText`] from raw text, counting tokens once.
pub(crate) fn source_text(
    tokenizer: &dyn Tokenizer,
    raw: String,
    origin: crate::types::SourceOrigin,
) -> SourceText {
    let token_count = tokenizer.count(&raw);
    SourceText {
        raw,
        token_count,
        origin,
    }
}
