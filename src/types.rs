use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One unit of spoken text with its position in the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Caption text.
    pub text: String,

    /// Offset from the start of the video.
    pub start: Duration,

    /// How long the caption stays on screen, when the source reports it.
    pub duration: Option<Duration>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: Duration) -> Self {
        Self {
            text: text.into(),
            start,
            duration: None,
        }
    }
}

/// Which adapter produced a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Video,
    Web,
}

/// Where a [`SourceText`] came from: the adapter kind plus the resolved
/// reference (video id or page URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOrigin {
    pub kind: SourceKind,
    pub reference: String,
}

impl SourceOrigin {
    pub fn video(video_id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Video,
            reference: video_id.into(),
        }
    }

    pub fn web(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Web,
            reference: url.into(),
        }
    }
}

/// Normalized source text before the token budget is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceText {
    pub raw: String,
    pub token_count: usize,
    pub origin: SourceOrigin,
}

/// Source text after the token ceiling has been enforced.
///
/// `token_count <= token_limit` always holds; `truncated` is set only when
/// the source text exceeded the limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetedText {
    pub text: String,
    pub token_count: usize,
    pub truncated: bool,
    pub origin: SourceOrigin,
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// A single message in a chat-style completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A provider-agnostic completion request. One per stage; no history is
/// carried between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g. `"gpt-4"`).
    pub model: String,

    /// Ordered messages; a system instruction, when present, comes first.
    pub messages: Vec<ChatMessage>,

    /// Output ceiling forwarded to the backend, which enforces it.
    pub max_output_tokens: u32,
}

/// What a pipeline run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Summary,
    Outline,
    Article,
}

/// The final text product of a run, ready to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub title: String,
    pub body: String,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A retrievable reference to a published artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactRef {
    /// Document store URL.
    Remote { url: String },
    /// File written to disk.
    Local { path: PathBuf },
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactRef::Remote { url } => write!(f, "{}", url),
            ArtifactRef::Local { path } => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::system("be brief");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be brief");
    }

    #[test]
    fn test_artifact_ref_display() {
        let remote = ArtifactRef::Remote {
            url: "https://docs.google.com/document/d/abc".into(),
        };
        assert_eq!(remote.to_string(), "https://docs.google.com/document/d/abc");

        let local = ArtifactRef::Local {
            path: PathBuf::from("/tmp/summary.md"),
        };
        assert_eq!(local.to_string(), "/tmp/summary.md");
    }
}
