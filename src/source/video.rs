//! Video-transcript adapter.

use super::{source_text, ContentSource};
use crate::error::Result;
use crate::tokenizer::Tokenizer;
use crate::types::{SourceOrigin, SourceText, TranscriptSegment};
use crate::PipelineError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Fetches the ordered caption segments for a resolved video id.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<TranscriptSegment>>;
}

/// Extract the video id from a watch URL or a short-form URL.
///
/// The `v` query parameter takes precedence; otherwise the path segment
/// after `/shorts/` is used. Anything else is [`PipelineError::InvalidReference`].
///
/// ```
/// use content_pipeline::source::resolve_video_id;
///
/// assert_eq!(resolve_video_id("https://www.youtube.com/watch?v=ABC123").unwrap(), "ABC123");
/// assert_eq!(resolve_video_id("https://youtube.com/shorts/XYZ789").unwrap(), "XYZ789");
/// assert!(resolve_video_id("https://example.com/about").is_err());
/// ```
pub fn resolve_video_id(video_url: &str) -> Result<String> {
    let url = Url::parse(video_url.trim())
        .map_err(|e| PipelineError::InvalidReference(format!("{}: {}", video_url, e)))?;

    if let Some((_, id)) = url.query_pairs().find(|(k, v)| k == "v" && !v.is_empty()) {
        return Ok(id.into_owned());
    }

    let mut segments = url.path_segments().into_iter().flatten();
    if segments.by_ref().any(|s| s == "shorts") {
        if let Some(id) = segments.next().filter(|s| !s.is_empty()) {
            return Ok(id.to_string());
        }
    }

    Err(PipelineError::InvalidReference(format!(
        "no video id in '{}' (expected ?v=<id> or /shorts/<id>)",
        video_url
    )))
}

/// Join caption text with newlines, preserving segment order.
pub fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// [`ContentSource`] over a [`TranscriptSource`].
pub struct VideoSource<T> {
    transcripts: T,
    tokenizer: Arc<dyn Tokenizer>,
}

impl<T: TranscriptSource> VideoSource<T> {
    pub fn new(transcripts: T, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            transcripts,
            tokenizer,
        }
    }
}

#[async_trait]
impl<T: TranscriptSource> ContentSource for VideoSource<T> {
    async fn acquire(&self, reference: &str) -> Result<SourceText> {
        let video_id = resolve_video_id(reference)?;
        debug!(video_id = %video_id, "fetching transcript");

        // Private, caption-less and missing videos all surface the same way.
        let segments = self
            .transcripts
            .fetch_segments(&video_id)
            .await
            .map_err(|e| match e {
                PipelineError::SourceUnavailable(_) | PipelineError::Cancelled => e,
                other => PipelineError::SourceUnavailable(format!(
                    "transcript for {}: {}",
                    video_id, other
                )),
            })?;

        if segments.is_empty() {
            warn!(video_id = %video_id, "transcript has no segments");
            return Err(PipelineError::SourceUnavailable(format!(
                "no transcript available for {}",
                video_id
            )));
        }

        debug!(video_id = %video_id, segments = segments.len(), "transcript fetched");
        Ok(source_text(
            self.tokenizer.as_ref(),
            join_segments(&segments),
            SourceOrigin::video(video_id),
        ))
    }

    fn name(&self) -> &'static str {
        "video"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::ApproxTokenizer;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeTranscripts {
        segments: Vec<TranscriptSegment>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeTranscripts {
        fn new(texts: &[&str]) -> Self {
            Self {
                segments: texts
                    .iter()
                    .enumerate()
                    .map(|(i, t)| TranscriptSegment::new(*t, Duration::from_secs(i as u64 * 3)))
                    .collect(),
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TranscriptSource for FakeTranscripts {
        async fn fetch_segments(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
            self.requested.lock().unwrap().push(video_id.to_string());
            Ok(self.segments.clone())
        }
    }

    struct BrokenTranscripts;

    #[async_trait]
    impl TranscriptSource for BrokenTranscripts {
        async fn fetch_segments(&self, _video_id: &str) -> Result<Vec<TranscriptSegment>> {
            Err(PipelineError::BackendError {
                status: Some(403),
                message: "captions disabled".into(),
            })
        }
    }

    #[test]
    fn test_resolve_watch_url() {
        assert_eq!(
            resolve_video_id("https://www.youtube.com/watch?v=rCPXBkeBWCQ").unwrap(),
            "rCPXBkeBWCQ"
        );
        assert_eq!(
            resolve_video_id("https://www.youtube.com/watch?feature=share&v=ABC123&t=10").unwrap(),
            "ABC123"
        );
    }

    #[test]
    fn test_resolve_shorts_url() {
        assert_eq!(
            resolve_video_id("https://www.youtube.com/shorts/XYZ789").unwrap(),
            "XYZ789"
        );
    }

    #[test]
    fn test_query_param_takes_precedence_over_shorts() {
        assert_eq!(
            resolve_video_id("https://www.youtube.com/shorts/XYZ789?v=ABC123").unwrap(),
            "ABC123"
        );
    }

    #[test]
    fn test_resolve_rejects_other_shapes() {
        for bad in [
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?v=",
            "https://www.youtube.com/shorts/",
            "https://example.com/video/123",
            "not a url",
        ] {
            let err = resolve_video_id(bad).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidReference(_)),
                "{} -> {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_join_segments_preserves_order() {
        let fake = FakeTranscripts::new(&["first line", "second line", "third"]);
        assert_eq!(join_segments(&fake.segments), "first line\nsecond line\nthird");
    }

    #[test]
    fn test_acquire_joins_transcript() {
        let source = VideoSource::new(
            FakeTranscripts::new(&["hello", "world"]),
            Arc::new(ApproxTokenizer),
        );
        let text = tokio_test::block_on(source.acquire("https://youtube.com/watch?v=abc")).unwrap();
        assert_eq!(text.raw, "hello\nworld");
        assert_eq!(text.origin, SourceOrigin::video("abc"));
        assert_eq!(text.token_count, 3);
        assert_eq!(*source.transcripts.requested.lock().unwrap(), vec!["abc"]);
    }

    #[tokio::test]
    async fn test_acquire_empty_transcript_is_unavailable() {
        let source = VideoSource::new(FakeTranscripts::new(&[]), Arc::new(ApproxTokenizer));
        let err = source
            .acquire("https://youtube.com/watch?v=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_acquire_fetch_failure_is_unavailable() {
        let source = VideoSource::new(BrokenTranscripts, Arc::new(ApproxTokenizer));
        let err = source
            .acquire("https://youtube.com/watch?v=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_acquire_bad_reference_never_fetches() {
        let fake = FakeTranscripts::new(&["x"]);
        let source = VideoSource::new(fake, Arc::new(ApproxTokenizer));
        let err = source.acquire("https://example.com").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference(_)));
        assert!(source.transcripts.requested.lock().unwrap().is_empty());
    }
}
