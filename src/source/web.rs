//! Web-page adapter: fetch a page and keep its paragraph text.
//!
//! Only `<p>` text is extracted. Headings, lists and tables are left out;
//! callers that need them should fetch and extract themselves.

use super::{source_text, ContentSource};
use crate::error::Result;
use crate::tokenizer::Tokenizer;
use crate::types::{SourceOrigin, SourceText};
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Text returned in place of page content when no paragraph has text.
pub const NO_CONTENT_FOUND: &str = "No content found.";

/// Fetches raw HTML for a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`PageFetcher`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            user_agent: "Mozilla/5.0".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| PipelineError::InvalidReference(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PipelineError::InvalidReference(format!(
                "unsupported scheme '{}' in {}",
                parsed.scheme(),
                url
            )));
        }

        let resp = self
            .client
            .get(parsed)
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("GET {}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::SourceUnavailable(format!(
                "GET {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }

        resp.text()
            .await
            .map_err(|e| PipelineError::SourceUnavailable(format!("reading {}: {}", url, e)))
    }
}

/// Newline-joined text of every `<p>` element, in document order.
///
/// Paragraphs whose text is empty are skipped. Returns `None` when no
/// paragraph has any text.
///
/// ```
/// use content_pipeline::source::extract_paragraphs;
///
/// let html = "<h1>Title</h1><p>One</p><p></p><p>Two <b>bold</b></p>";
/// assert_eq!(extract_paragraphs(html).as_deref(), Some("One\nTwo bold"));
/// assert_eq!(extract_paragraphs("<div>no paragraphs</div>"), None);
/// ```
pub fn extract_paragraphs(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("p").ok()?;

    let paragraphs: Vec<String> = doc
        .select(&sel)
        .map(|p| p.text().collect::<String>())
        .filter(|t| !t.is_empty())
        .collect();

    if paragraphs.is_empty() {
        None
    } else {
        Some(paragraphs.join("\n"))
    }
}

/// [`ContentSource`] over a [`PageFetcher`].
pub struct WebSource<F> {
    fetcher: F,
    tokenizer: Arc<dyn Tokenizer>,
}

impl<F: PageFetcher> WebSource<F> {
    pub fn new(fetcher: F, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { fetcher, tokenizer }
    }
}

#[async_trait]
impl<F: PageFetcher> ContentSource for WebSource<F> {
    async fn acquire(&self, reference: &str) -> Result<SourceText> {
        let html = self.fetcher.fetch(reference).await?;
        debug!(url = reference, bytes = html.len(), "page fetched");

        let raw = match extract_paragraphs(&html) {
            Some(text) => text,
            None => {
                info!(url = reference, "page has no paragraph text");
                NO_CONTENT_FOUND.to_string()
            }
        };

        Ok(source_text(
            self.tokenizer.as_ref(),
            raw,
            SourceOrigin::web(reference.trim()),
        ))
    }

    fn name(&self) -> &'static str {
        "web"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::ApproxTokenizer;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ARTICLE: &str = r#"<html><head><title>AI</title></head><body>
        <h1>Artificial intelligence</h1>
        <p>Artificial intelligence is intelligence exhibited by machines.</p>
        <ul><li>ignored list item</li></ul>
        <p></p>
        <p>It has <a href="/x">many</a> applications.</p>
    </body></html>"#;

    #[test]
    fn test_extract_paragraphs_in_order() {
        let text = extract_paragraphs(ARTICLE).unwrap();
        assert_eq!(
            text,
            "Artificial intelligence is intelligence exhibited by machines.\nIt has many applications."
        );
        assert!(!text.contains("ignored list item"));
        assert!(!text.contains("Artificial intelligence\n"));
    }

    #[test]
    fn test_extract_paragraphs_none() {
        assert_eq!(extract_paragraphs("<html><body><div>x</div></body></html>"), None);
        assert_eq!(extract_paragraphs("<p></p><p></p>"), None);
    }

    #[tokio::test]
    async fn test_web_source_fetches_and_extracts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/AI"))
            .and(header("User-Agent", "Mozilla/5.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
            .mount(&server)
            .await;

        let source = WebSource::new(HttpFetcher::new(Client::new()), Arc::new(ApproxTokenizer));
        let url = format!("{}/wiki/AI", server.uri());
        let text = source.acquire(&url).await.unwrap();
        assert!(text.raw.starts_with("Artificial intelligence is"));
        assert_eq!(text.origin, SourceOrigin::web(url));
    }

    #[tokio::test]
    async fn test_web_source_no_paragraphs_is_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<div>nothing</div>"))
            .mount(&server)
            .await;

        let source = WebSource::new(HttpFetcher::new(Client::new()), Arc::new(ApproxTokenizer));
        let text = source.acquire(&server.uri()).await.unwrap();
        assert_eq!(text.raw, NO_CONTENT_FOUND);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Client::new());
        let err = fetcher.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_unavailable() {
        let fetcher = HttpFetcher::new(Client::new()).with_timeout(Duration::from_secs(2));
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_url() {
        let fetcher = HttpFetcher::new(Client::new());
        let err = fetcher.fetch("example.com/page").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference(_)));

        let err = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidReference(_)));
    }
}
