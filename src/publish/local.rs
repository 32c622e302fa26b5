use super::Publisher;
use crate::error::Result;
use crate::types::{Artifact, ArtifactRef};
use crate::PipelineError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Writes artifacts as markdown files under a directory.
///
/// Files are named `{slug(title)}-{unix_seconds}.md`, with a `-{n}` suffix
/// when that name is taken. Existing files are never overwritten. The
/// directory is created on first use.
#[derive(Debug, Clone)]
pub struct LocalFilePublisher {
    dir: PathBuf,
}

impl LocalFilePublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

/// Generate a filesystem-safe slug from a title.
pub(crate) fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "artifact".to_string()
    } else {
        slug
    }
}

#[async_trait]
impl Publisher for LocalFilePublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ArtifactRef> {
        let failure = |e: std::io::Error| {
            PipelineError::PublishFailure(format!(
                "failed to write artifact under {}: {}",
                self.dir.display(),
                e
            ))
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(failure)?;

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let slug = slugify(&artifact.title);
        let contents = format!("# {}\n\n{}\n", artifact.title, artifact.body);

        let mut attempt = 0u32;
        let (path, mut file) = loop {
            let name = match attempt {
                0 => format!("{}-{}.md", slug, stamp),
                n => format!("{}-{}-{}.md", slug, stamp, n),
            };
            let path = self.dir.join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "artifact file exists, trying next name");
                    attempt += 1;
                }
                Err(e) => return Err(failure(e)),
            }
        };
        file.write_all(contents.as_bytes()).await.map_err(failure)?;
        file.flush().await.map_err(failure)?;

        info!(path = %path.display(), "artifact saved locally");
        Ok(ArtifactRef::Local { path })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactKind;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("YouTube Transcript Summary"), "youtube-transcript-summary");
        assert_eq!(slugify("  Website -- Article! "), "website-article");
        assert_eq!(slugify("???"), "artifact");
    }

    #[tokio::test]
    async fn test_writes_markdown_file() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalFilePublisher::new(dir.path().join("out"));
        let artifact = Artifact::new(ArtifactKind::Summary, "Website Summary", "Body text.");

        let reference = publisher.publish(&artifact).await.unwrap();
        let path = match reference {
            ArtifactRef::Local { path } => path,
            other => panic!("expected local ref, got {:?}", other),
        };

        assert!(path.starts_with(dir.path().join("out")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("website-summary-"));
        assert!(name.ends_with(".md"));
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "# Website Summary\n\nBody text.\n");
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_publish_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let publisher = LocalFilePublisher::new(blocker.join("nested"));
        let artifact = Artifact::new(ArtifactKind::Summary, "t", "b");
        let err = publisher.publish(&artifact).await.unwrap_err();
        assert!(matches!(err, PipelineError::PublishFailure(_)));
    }

    #[tokio::test]
    async fn test_same_title_same_second_keeps_both() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = LocalFilePublisher::new(dir.path());
        let first = Artifact::new(ArtifactKind::Summary, "Website Summary", "first");
        let second = Artifact::new(ArtifactKind::Summary, "Website Summary", "second");

        let a = publisher.publish(&first).await.unwrap();
        let b = publisher.publish(&second).await.unwrap();
        let (a, b) = match (a, b) {
            (ArtifactRef::Local { path: a }, ArtifactRef::Local { path: b }) => (a, b),
            other => panic!("expected local refs, got {:?}", other),
        };

        assert_ne!(a, b);
        assert!(std::fs::read_to_string(&a).unwrap().contains("first"));
        assert!(std::fs::read_to_string(&b).unwrap().contains("second"));
    }

    #[tokio::test]
    async fn test_existing_file_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        // Occupy the names the next publish could pick within this second and the next.
        for s in [stamp, stamp + 1] {
            std::fs::write(dir.path().join(format!("notes-{}.md", s)), "keep me").unwrap();
        }

        let publisher = LocalFilePublisher::new(dir.path());
        let artifact = Artifact::new(ArtifactKind::Summary, "Notes", "new body");
        publisher.publish(&artifact).await.unwrap();

        for s in [stamp, stamp + 1] {
            let kept = std::fs::read_to_string(dir.path().join(format!("notes-{}.md", s))).unwrap();
            assert_eq!(kept, "keep me");
        }
    }
}
