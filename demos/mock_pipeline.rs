//! Example: running an outline-then-article pipeline without a live LLM or network.
//!
//! Run with: `cargo run --example mock_pipeline`

use async_trait::async_trait;
use content_pipeline::backend::MockReply;
use content_pipeline::publish::LocalFilePublisher;
use content_pipeline::source::{PageFetcher, WebSource};
use content_pipeline::tokenizer::{ApproxTokenizer, Tokenizer};
use content_pipeline::{
    CompletionClient, MockBackend, Pipeline, PipelineShape, RetryPolicy, SourceRequest,
};
use std::sync::Arc;
use std::time::Duration;

const PAGE: &str = r#"<html><body>
    <h1>Rust</h1>
    <p>Rust is a general-purpose programming language emphasizing performance and safety.</p>
    <p>It enforces memory safety without a garbage collector.</p>
</body></html>"#;

/// Serves the same page for every URL.
struct StaticPage;

#[async_trait]
impl PageFetcher for StaticPage {
    async fn fetch(&self, _url: &str) -> content_pipeline::Result<String> {
        Ok(PAGE.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // One rate limit, then the outline, then the article
    let mock = Arc::new(MockBackend::new(vec![
        MockReply::RateLimited,
        MockReply::text("1. What Rust is\n2. Memory safety"),
        MockReply::text("Rust is a systems language that keeps memory safe without a GC."),
    ]));

    let client = CompletionClient::builder("http://unused")
        .backend(mock.clone())
        .retry_policy(RetryPolicy::fixed(Duration::from_millis(100)))
        .build()?;

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(ApproxTokenizer);
    let out_dir = std::env::temp_dir().join("content-pipeline-demo");
    let pipeline = Pipeline::builder(client)
        .tokenizer(tokenizer.clone())
        .web_source(Arc::new(WebSource::new(StaticPage, tokenizer)))
        .publisher(Arc::new(LocalFilePublisher::new(&out_dir)))
        .build()?;

    let run = pipeline
        .run(
            SourceRequest::Web("https://en.wikipedia.org/wiki/Rust_(programming_language)".into()),
            PipelineShape::OutlineThenArticle,
        )
        .await?;

    println!("Outline:\n{}\n", run.outline.as_deref().unwrap_or_default());
    if let Some(reference) = run.reference() {
        println!("Article saved: {}", reference);
    }

    // Check diagnostics
    println!("States: {:?}", run.history);
    println!("Backend calls: {}", mock.call_count());
    println!("Rate-limit waits: {}", run.diagnostics.rate_limit_waits);

    Ok(())
}
